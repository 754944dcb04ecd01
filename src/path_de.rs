use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(path: &Path, src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let at = err.path().to_string();
        Error::Parse { path: path.to_path_buf(), message: format!("at JSON path {at} → {}", err.into_inner()) }
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    from_str_with_path(path, &src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[allow(dead_code)]
        inner: Vec<Inner>,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        #[allow(dead_code)]
        n: u32,
    }

    #[test]
    fn errors_name_the_offending_path() {
        let err = from_str_with_path::<Outer>(Path::new("x.json"), r#"{"inner": [{"n": 1}, {"n": "two"}]}"#).unwrap_err();
        let Error::Parse { message, .. } = err else { panic!("expected a parse error") };
        assert!(message.starts_with("at JSON path inner[1].n → "), "{message}");
    }

    #[test]
    fn missing_files_are_read_errors() {
        let err = read_json::<Outer>(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
