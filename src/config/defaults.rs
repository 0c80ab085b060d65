use super::*;

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            entsoe: EntsoeConfig::default(),
            smard: SmardConfig::default(),
            open_meteo: OpenMeteoConfig::default(),
        }
    }
}

impl Default for EntsoeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web-api.tp.entsoe.eu/api".to_string(),
            api_key: String::new(),
            domain: "10Y1001A1001A83F".to_string(),
            psr_types: [
                "B01", "B09", "B11", "B12", "B15", "B16", "B17", "B18", "B19",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for SmardConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.smard.de/app/chart_data".to_string(),
            filter: 410,
            region: "DE".to_string(),
            resolution: "hour".to_string(),
        }
    }
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        let loc = |name: &str, latitude, longitude| LocationConfig {
            name: name.to_string(),
            latitude,
            longitude,
        };
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            locations: vec![
                loc("Hamburg", 53.55, 10.00),
                loc("Berlin", 52.52, 13.40),
                loc("Frankfurt", 50.11, 8.68),
                loc("Munich", 48.14, 11.58),
                loc("Freiburg", 47.99, 7.85),
            ],
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            staleness_horizon_days: 14,
            min_plausible_share: 0.10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            today_ttl_secs: 3600,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            renewable_share: 0.574,
            sun_hours: 4.7,
            wind_speed_kmh: 12.5,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            share: 0.80,
            year: 2030,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/wende".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
            console_level: None,
            file_level: None,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
            refresh_interval_secs: 900,
            sources: SourcesConfig::default(),
            aggregation: AggregationConfig::default(),
            cache: CacheConfig::default(),
            baseline: BaselineConfig::default(),
            target: TargetConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}
