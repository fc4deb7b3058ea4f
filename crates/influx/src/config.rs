use std::collections::BTreeMap;

use url::Url;

use crate::SystemError;

/// Flat string configuration handed over by the host framework.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapConfig {
    entries: BTreeMap<String, String>,
}

impl MapConfig {
    #[must_use]
    pub const fn new(entries: BTreeMap<String, String>) -> MapConfig {
        MapConfig { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Entries under `prefix`, with the prefix stripped.
    #[must_use]
    pub fn subset(&self, prefix: &str) -> MapConfig {
        MapConfig {
            entries: self
                .entries
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key[prefix.len()..].to_string(), value.clone()))
                .collect(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MapConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        MapConfig {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Connection settings of one `InfluxDB` system.
#[derive(Clone, PartialEq, Eq)]
pub struct InfluxConfig {
    /// `InfluxDB` endpoint (e.g., `http://localhost:8086`).
    pub uri: Url,
    pub username: String,
    pub password: String,
    /// `InfluxDB` v1 database name.
    pub database: String,
}

impl std::fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("uri", &self.uri.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl InfluxConfig {
    /// Reads `systems.<system_name>.{uri,username,password,database}`.
    ///
    /// # Errors
    ///
    /// Errors if a key is missing or the uri does not parse.
    pub fn from_config(system_name: &str, config: &MapConfig) -> Result<InfluxConfig, SystemError> {
        let scoped = config.subset(&format!("systems.{system_name}."));
        let required = |key: &'static str| {
            scoped
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| SystemError::MissingConfig {
                    key: format!("systems.{system_name}.{key}"),
                })
        };

        let uri = required("uri")?;
        let username = required("username")?;
        let password = required("password")?;
        let database = required("database")?;

        let uri = Url::parse(&uri).map_err(|err| SystemError::InvalidUri { uri, err })?;

        Ok(InfluxConfig { uri, username, password, database })
    }

    /// Builds the v1 `/write` endpoint with nanosecond precision.
    #[must_use]
    pub fn write_url(&self) -> Url {
        let mut url = self.uri.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("write");
        }
        url.query_pairs_mut()
            .append_pair("db", &self.database)
            .append_pair("precision", "ns")
            .append_pair("u", &self.username)
            .append_pair("p", &self.password);

        url
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn full_config() -> MapConfig {
        MapConfig::from_iter([
            ("systems.influx.uri", "http://localhost:8086"),
            ("systems.influx.username", "admin"),
            ("systems.influx.password", "secret"),
            ("systems.influx.database", "metrics"),
            ("systems.other.uri", "http://elsewhere:8086"),
        ])
    }

    #[test]
    fn subset_strips_prefix() {
        let subset = full_config().subset("systems.influx.");

        assert_eq!(subset.get("uri"), Some("http://localhost:8086"));
        assert_eq!(subset.get("database"), Some("metrics"));
        assert_eq!(subset.entries.len(), 4);
    }

    #[test]
    fn from_config_reads_scoped_keys() {
        let config = InfluxConfig::from_config("influx", &full_config()).unwrap();

        expect![[r#"InfluxConfig { uri: "http://localhost:8086/", username: "admin", password: "<redacted>", database: "metrics" }"#]]
            .assert_eq(&format!("{config:?}"));
    }

    #[test]
    fn from_config_missing_key() {
        let err = InfluxConfig::from_config("other", &full_config()).unwrap_err();

        expect!["Missing config; key=systems.other.username"].assert_eq(&err.to_string());
    }

    #[test]
    fn from_config_invalid_uri() {
        let config = MapConfig::from_iter([
            ("systems.influx.uri", "not a uri"),
            ("systems.influx.username", "admin"),
            ("systems.influx.password", "secret"),
            ("systems.influx.database", "metrics"),
        ]);

        let err = InfluxConfig::from_config("influx", &config).unwrap_err();

        assert!(matches!(err, SystemError::InvalidUri { .. }), "{err}");
    }

    #[test]
    fn write_url_basic() {
        let config = InfluxConfig::from_config("influx", &full_config()).unwrap();

        expect!["http://localhost:8086/write?db=metrics&precision=ns&u=admin&p=secret"]
            .assert_eq(config.write_url().as_str());
    }

    #[test]
    fn write_url_escapes_credentials() {
        let mut config = InfluxConfig::from_config("influx", &full_config()).unwrap();
        config.password = "p&ss word".to_string();

        expect!["http://localhost:8086/write?db=metrics&precision=ns&u=admin&p=p%26ss+word"]
            .assert_eq(config.write_url().as_str());
    }
}
