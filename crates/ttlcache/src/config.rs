use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for constructing a named cache from configuration.
///
/// ```json
/// {"name": "mx-lookup", "ttl": "5m"}
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CacheParams {
    pub name: String,
    /// How long an installed result remains fresh.
    /// May be specified either as a humantime string such as `"5m"`,
    /// or as a number of seconds.
    #[serde(with = "ttl_serde")]
    pub ttl: Duration,
}

impl CacheParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

mod ttl_serde {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = Duration;

            fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str("a duration string or a number of seconds")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Duration, E> {
                Duration::try_from_secs_f64(v).map_err(|err| E::custom(format!("{err:#}")))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Duration, E> {
                Ok(Duration::from_secs(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Duration, E> {
                match u64::try_from(v) {
                    Ok(secs) => Ok(Duration::from_secs(secs)),
                    Err(err) => Err(E::custom(format!(
                        "ttl must be a positive number of seconds (error: {err:#})"
                    ))),
                }
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Duration, E> {
                humantime::parse_duration(v)
                    .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
            }
        }

        d.deserialize_any(V)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_humantime() {
        let params: CacheParams =
            serde_json::from_str(r#"{"name": "mx", "ttl": "5m"}"#).unwrap();
        k9::assert_equal!(
            params,
            CacheParams {
                name: "mx".to_string(),
                ttl: Duration::from_secs(300),
            }
        );
        params.validate().unwrap();
    }

    #[test]
    fn parse_seconds() {
        let params: CacheParams = serde_json::from_str(r#"{"name": "mx", "ttl": 1.5}"#).unwrap();
        k9::assert_equal!(params.ttl, Duration::from_millis(1500));

        let params: CacheParams = serde_json::from_str(r#"{"name": "mx", "ttl": 10}"#).unwrap();
        k9::assert_equal!(params.ttl, Duration::from_secs(10));

        assert!(serde_json::from_str::<CacheParams>(r#"{"name": "mx", "ttl": -1}"#).is_err());
        assert!(serde_json::from_str::<CacheParams>(r#"{"name": "mx", "ttl": "soon"}"#).is_err());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let params: CacheParams = serde_json::from_str(r#"{"name": "mx", "ttl": 0}"#).unwrap();
        k9::assert_equal!(
            params.validate(),
            Err(ConfigError::ZeroTtl {
                name: "mx".to_string()
            })
        );
    }

    #[test]
    fn serialize_round_trips_through_humantime() {
        let params = CacheParams {
            name: "mx".to_string(),
            ttl: Duration::from_secs(90),
        };
        let json = serde_json::to_string(&params).unwrap();
        k9::assert_equal!(json, r#"{"name":"mx","ttl":"1m 30s"}"#);
    }
}
