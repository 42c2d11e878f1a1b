use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Clock widget options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockOptions {
    pub use_24_hour: bool,
    /// Colour of every `7` digit (#RRGGBB)
    pub highlight_color: String,
}

impl Default for ClockOptions {
    fn default() -> Self {
        Self {
            use_24_hour: true,
            highlight_color: "#9c27b0".to_string(),
        }
    }
}

/// Working day used by the countdown widget. Persisted verbatim as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkHours {
    pub start: String,  // "HH:MM"
    pub lunch: String,
    pub end: String,
    pub daily_salary: f64,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start: "07:50".to_string(),
            lunch: "11:20".to_string(),
            end: "17:30".to_string(),
            daily_salary: 250.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkTimeOptions {
    pub work_hours: WorkHours,
    /// Send a desktop notification once the working day is over
    pub notify_on_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityPreset {
    pub value: String,  // query name, e.g. "Weihai"
    pub label: String,  // display name, e.g. "威海"
}

impl CityPreset {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherOptions {
    /// OpenWeatherMap API key
    pub api_key: String,
    pub endpoint: String,
    pub default_city: String,
    pub presets: Vec<CityPreset>,
    pub city_data_path: String,
    /// Always "metric": temperatures in °C, wind in m/s
    pub units: String,
}

impl Default for WeatherOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            default_city: "Weihai".to_string(),
            presets: vec![
                CityPreset::new("Weihai", "威海"),
                CityPreset::new("Wuhan", "武汉"),
                CityPreset::new("Guiyang", "贵阳"),
            ],
            city_data_path: "data/city.json".to_string(),
            units: "metric".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortcut {
    pub label: String,
    pub url: String,
}

impl Shortcut {
    fn new(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutOptions {
    pub shortcuts: Vec<Shortcut>,
    /// Category/nav data shown below the fixed shortcuts
    pub nav_path: String,
}

impl Default for ShortcutOptions {
    fn default() -> Self {
        Self {
            shortcuts: vec![
                Shortcut::new("bilibili", "http://www.bilibili.com"),
                Shortcut::new("抖音", "https://www.douyin.com/"),
                Shortcut::new("GitHub", "https://github.com/"),
            ],
            nav_path: "data/nav.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HotSource {
    Weibo,
    Baidu,
}

impl HotSource {
    pub fn other(self) -> Self {
        match self {
            HotSource::Weibo => HotSource::Baidu,
            HotSource::Baidu => HotSource::Weibo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotSearchOptions {
    pub update_interval_secs: u64,
    pub max_items: usize,
    pub default_source: HotSource,
    pub weibo_url: String,
    pub baidu_url: String,
}

impl Default for HotSearchOptions {
    fn default() -> Self {
        Self {
            update_interval_secs: 300,
            max_items: 50,
            default_source: HotSource::Weibo,
            weibo_url: "https://v2.xxapi.cn/api/weibohot".to_string(),
            baidu_url: "https://v2.xxapi.cn/api/baiduhot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteOptions {
    pub endpoint: String,
    /// Shown when the quote service cannot be reached
    pub fallback_text: String,
    pub fallback_from: String,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://v1.hitokoto.cn/?encode=json".to_string(),
            fallback_text: "路漫漫其修远兮，吾将上下而求索。".to_string(),
            fallback_from: "离骚".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarOptions {
    pub holidays_path: String,
    pub week_starts_monday: bool,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            holidays_path: "data/holidays.json".to_string(),
            week_starts_monday: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Optional kitty-style colour file for the palette
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_file: Option<PathBuf>,

    /// Widgets per grid row
    pub columns: u16,

    pub clock: ClockOptions,
    pub work_time: WorkTimeOptions,
    pub weather: WeatherOptions,
    pub shortcuts: ShortcutOptions,
    pub hot_search: HotSearchOptions,
    pub quote: QuoteOptions,
    pub calendar: CalendarOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme_file: None,
            columns: 3,
            clock: ClockOptions::default(),
            work_time: WorkTimeOptions::default(),
            weather: WeatherOptions::default(),
            shortcuts: ShortcutOptions::default(),
            hot_search: HotSearchOptions::default(),
            quote: QuoteOptions::default(),
            calendar: CalendarOptions::default(),
        }
    }
}

/// Command line overrides, applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub twelve_hour: bool,
    pub city: Option<String>,
    pub hot_source: Option<HotSource>,
}

impl AppConfig {
    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("startpage");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from `path` (or the default location), creating it with
    /// defaults when missing. Parse errors are logged and defaults used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_path() {
                Ok(p) => p,
                Err(_) => return Ok(AppConfig::default()),
            },
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        if let Err(e) = config.save_to(&path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply caller overrides; they win over file and defaults
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.data_dir {
            self.weather.city_data_path = dir.join("city.json").display().to_string();
            self.calendar.holidays_path = dir.join("holidays.json").display().to_string();
            self.shortcuts.nav_path = dir.join("nav.json").display().to_string();
        }
        if overrides.twelve_hour {
            self.clock.use_24_hour = false;
        }
        if let Some(city) = &overrides.city {
            self.weather.default_city = city.clone();
        }
        if let Some(source) = overrides.hot_source {
            self.hot_search.default_source = source;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig::default();
        config.clock.highlight_color = "#ff5722".to_string();
        config.hot_search.default_source = HotSource::Baidu;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.clock.highlight_color, "#ff5722");
        assert_eq!(deserialized.hot_search.default_source, HotSource::Baidu);
        assert_eq!(deserialized.weather.presets.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_struct_defaults() {
        let config: AppConfig = toml::from_str(
            r##"
            [clock]
            highlight_color = "#ff5722"

            [work_time.work_hours]
            start = "09:00"
            lunch = "12:00"
            end = "18:00"
            dailySalary = 300.5
            "##,
        )
        .unwrap();

        assert!(config.clock.use_24_hour);
        assert_eq!(config.clock.highlight_color, "#ff5722");
        assert_eq!(config.work_time.work_hours.start, "09:00");
        assert_eq!(config.work_time.work_hours.daily_salary, 300.5);
        assert_eq!(config.hot_search.max_items, 50);
        assert_eq!(config.columns, 3);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [clock]
            use_24_hour = true

            [weather]
            default_city = "Wuhan"
            "#,
        )
        .unwrap();

        config.apply_overrides(&Overrides {
            data_dir: Some(PathBuf::from("/srv/startpage")),
            twelve_hour: true,
            city: Some("Guiyang".to_string()),
            hot_source: Some(HotSource::Baidu),
        });

        assert!(!config.clock.use_24_hour);
        assert_eq!(config.weather.default_city, "Guiyang");
        assert_eq!(config.hot_search.default_source, HotSource::Baidu);
        assert_eq!(config.calendar.holidays_path, "/srv/startpage/holidays.json");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.weather.default_city, "Weihai");

        std::fs::write(&path, "columns = \"three\"").unwrap();
        let fallback = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(fallback.columns, 3);
    }

    #[test]
    fn test_work_hours_json_shape() {
        let json = serde_json::to_string(&WorkHours::default()).unwrap();
        assert_eq!(
            json,
            r#"{"start":"07:50","lunch":"11:20","end":"17:30","dailySalary":250.0}"#
        );
    }
}
