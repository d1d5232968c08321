//! INI file configuration adapter.

use crate::domain::error::FolioError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FolioError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| FolioError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[database]
backend = postgres

[postgres]
connection_string = host=localhost dbname=folio

[server]
bind = 127.0.0.1:8080
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("postgres", "connection_string"),
            Some("host=localhost dbname=folio".to_string())
        );
        assert_eq!(
            adapter.get_string("server", "bind"),
            Some("127.0.0.1:8080".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[sqlite]\npath = folio.db\n").unwrap();
        assert_eq!(adapter.get_string("sqlite", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[prediction]\nmax_days = 365\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("prediction", "max_days", 0), 365);
        assert_eq!(adapter.get_int("prediction", "missing", 42), 42);
        assert_eq!(adapter.get_int("prediction", "bad", 42), 42);
    }

    #[test]
    fn missing_section_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[server]\nbind = 0.0.0.0:80\n").unwrap();
        assert_eq!(adapter.get_string("sqlite", "path"), None);
        assert_eq!(adapter.get_int("sqlite", "pool_size", 4), 4);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /var/lib/folio.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/folio.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(FolioError::ConfigParse { .. })));
    }
}
