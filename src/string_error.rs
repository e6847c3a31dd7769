use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError(pub &'static str);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for StringError {}

#[cfg(target_os = "espidf")]
pub use esp::StringEspError;

#[cfg(target_os = "espidf")]
mod esp {
    use std::fmt;

    use esp_idf_svc::sys::EspError;

    #[derive(Debug)]
    pub struct StringEspError(pub &'static str, pub EspError);

    impl fmt::Display for StringEspError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {}", self.0, self.1)
        }
    }

    impl std::error::Error for StringEspError {}
}
