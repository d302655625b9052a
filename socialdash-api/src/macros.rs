macro_rules! setter {
    ($field:ident : $ty:ty) => {
        pub fn $field<T>(mut self, $field: T) -> Self
        where
            T: Into<$ty>,
        {
            self.$field = $field.into();
            self
        }
    };

    (opt $field:ident : $ty:ty) => {
        pub fn $field<T>(mut self, $field: T) -> Self
        where
            T: Into<$ty>,
        {
            self.$field = std::option::Option::Some($field.into());
            self
        }
    };

    (opt $field:ident . $subfield:ident : $ty:ty) => {
        pub fn $subfield<T>(mut self, $subfield: T) -> Self
        where
            T: Into<$ty>,
        {
            self.$field.$subfield = Some($subfield.into());
            self
        }
    };

    // Blank strings clear the field: an absent key means "no filter".
    (text $field:ident) => {
        pub fn $field<T>(mut self, $field: T) -> Self
        where
            T: Into<String>,
        {
            let value: String = $field.into();
            self.$field = if value.is_empty() {
                None
            } else {
                Some(value)
            };
            self
        }
    };
}

pub(crate) use setter;
