use url_encoded_data::UrlEncodedData;

/// Body of an `application/x-www-form-urlencoded` POST.
#[derive(Debug, Clone, Default)]
pub struct PostData {
    body: String,
}

impl PostData {
    pub fn from_string(s: String) -> Self {
        Self { body: s }
    }

    pub fn read_value(&self, key: &str) -> Option<String> {
        UrlEncodedData::from(self.body.as_str())
            .get_first(key)
            .map(|v| v.to_string())
    }
}
