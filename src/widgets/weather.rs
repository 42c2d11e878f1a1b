//! Current weather from the OpenWeatherMap API (metric units)

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use serde::Deserialize;
use serde_json::Value;

use super::Widget;
use crate::config::WeatherOptions;
use crate::fetch::{Delivery, FetchError, Fetcher, RequestKind, RequestToken, Source};
use crate::layout::WidgetId;
use crate::ui::components::{accent, accent_bright, danger, text, text_dim, widget_block};

const DIRECTIONS: [&str; 8] = ["北", "东北", "东", "东南", "南", "西南", "西", "西北"];

/// Upper bounds (m/s, exclusive) of Beaufort levels 0..=11
const BEAUFORT_LIMITS: [f64; 12] = [0.3, 1.6, 3.4, 5.5, 8.0, 10.8, 13.9, 17.2, 20.8, 24.5, 28.5, 32.7];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub pinyin: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct CityGroup {
    #[serde(default)]
    list: Vec<CityRecord>,
}

#[derive(Debug, Deserialize)]
struct CityFile {
    city: Vec<CityGroup>,
}

/// Flatten `{"city": [{"list": [...]}, ...]}` into one list
pub fn parse_cities(payload: Value) -> Result<Vec<CityRecord>, FetchError> {
    let file: CityFile = serde_json::from_value(payload)?;
    Ok(file.city.into_iter().flat_map(|g| g.list).collect())
}

fn is_chinese(s: &str) -> bool {
    s.chars().any(|c| ('\u{4e00}'..='\u{9fa5}').contains(&c))
}

fn lookup_pinyin(name: &str, cities: &[CityRecord]) -> Option<String> {
    cities
        .iter()
        .find(|c| c.name == name || c.label.contains(name))
        .map(|c| c.pinyin.clone())
}

/// Pick the city to query. Typed input wins over the selected preset.
/// Chinese names are looked up in the city list and mapped to their pinyin;
/// unknown typed input is rejected, an unknown selected city is sent as is.
pub fn resolve_city(input: &str, selected: &str, cities: &[CityRecord]) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        let selected = selected.trim();
        if selected.is_empty() {
            return None;
        }
        if is_chinese(selected) {
            return Some(lookup_pinyin(selected, cities).unwrap_or_else(|| selected.to_string()));
        }
        return Some(selected.to_string());
    }

    if is_chinese(input) {
        lookup_pinyin(input, cities)
    } else {
        Some(input.to_string())
    }
}

pub fn translate_description(english: &str) -> String {
    let english = english.to_lowercase();
    let chinese = match english.as_str() {
        "clear sky" => "晴空",
        "few clouds" => "少云",
        "scattered clouds" => "散云",
        "broken clouds" => "多云",
        "overcast clouds" => "阴天",
        "shower rain" => "阵雨",
        "rain" => "雨",
        "light rain" => "小雨",
        "moderate rain" => "中雨",
        "heavy rain" => "大雨",
        "thunderstorm" => "雷暴",
        "snow" => "雪",
        "light snow" => "小雪",
        "heavy snow" => "大雪",
        "mist" => "薄雾",
        "fog" => "雾",
        "haze" => "霾",
        "dust" => "尘",
        "sand" => "沙尘",
        "smoke" => "烟雾",
        "tornado" => "龙卷风",
        _ => return english,
    };
    chinese.to_string()
}

/// Beaufort level for a wind speed in m/s
pub fn wind_level(speed: f64) -> u8 {
    BEAUFORT_LIMITS
        .iter()
        .position(|limit| speed < *limit)
        .unwrap_or(BEAUFORT_LIMITS.len()) as u8
}

/// 8-point compass direction for a bearing in degrees
pub fn wind_direction(deg: f64) -> &'static str {
    let index = ((deg % 360.0) / 45.0).round() as usize % 8;
    DIRECTIONS[index]
}

/// Terminal glyph for an OpenWeatherMap icon code (`10d`, `04n`, ...)
pub fn icon_glyph(code: &str) -> &'static str {
    match code.get(..2).unwrap_or("") {
        "01" => "☀",
        "02" => "⛅",
        "03" | "04" => "☁",
        "09" | "10" => "☂",
        "11" => "⚡",
        "13" => "❄",
        "50" => "≋",
        _ => "·",
    }
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmClouds {
    all: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: String,
    #[serde(default)]
    sys: OwmSys,
    weather: Vec<OwmCondition>,
    main: OwmMain,
    wind: OwmWind,
    #[serde(default)]
    clouds: OwmClouds,
}

/// Display-ready weather fields
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub description: String,
    pub icon: String,
    pub temp: String,
    pub site: String,
    pub humidity: String,
    pub pressure: String,
    pub feels_like: String,
    pub wind: String,
    pub wind_direction: String,
    pub clouds: String,
}

impl WeatherReport {
    pub fn from_payload(payload: Value) -> Result<Self, FetchError> {
        // `cod` is a number on success and a string on API errors
        let ok = match payload.get("cod") {
            Some(Value::Number(n)) => n.as_u64() == Some(200),
            Some(Value::String(s)) => s == "200",
            _ => false,
        };
        if !ok {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("无效的天气数据");
            return Err(FetchError::Api(message.to_string()));
        }

        let data: OwmResponse = serde_json::from_value(payload)?;
        let condition = data
            .weather
            .first()
            .ok_or_else(|| FetchError::Api("无效的天气数据".to_string()))?;

        Ok(Self {
            description: translate_description(&condition.description),
            icon: condition.icon.clone(),
            temp: format!("{:.1}", data.main.temp),
            site: format!("{} / {}", data.name, data.sys.country),
            humidity: format!("{}%", data.main.humidity),
            pressure: format!("{} hPa", data.main.pressure),
            feels_like: format!("{:.0}°C", data.main.feels_like),
            wind: format!("{}级 | {} m/s", wind_level(data.wind.speed), data.wind.speed),
            wind_direction: wind_direction(data.wind.deg).to_string(),
            clouds: format!("{}%", data.clouds.all),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherState {
    Idle,
    Loading,
    Ready(WeatherReport),
    Failed(String),
}

pub struct WeatherWidget {
    options: WeatherOptions,
    fetcher: Fetcher,
    cities: Vec<CityRecord>,
    selected: String,
    input: String,
    editing: bool,
    state: WeatherState,
    cities_token: RequestToken,
    weather_token: RequestToken,
    disposed: bool,
}

impl WeatherWidget {
    pub fn new(options: WeatherOptions, fetcher: Fetcher) -> Self {
        if options.api_key.is_empty() {
            tracing::warn!("No weather api_key configured, requests will be rejected");
        }
        Self {
            selected: options.default_city.clone(),
            options,
            fetcher,
            cities: Vec::new(),
            input: String::new(),
            editing: false,
            state: WeatherState::Idle,
            cities_token: RequestToken::default(),
            weather_token: RequestToken::default(),
            disposed: false,
        }
    }

    pub fn state(&self) -> &WeatherState {
        &self.state
    }

    /// The line shown in the result slot
    pub fn status_text(&self) -> String {
        match &self.state {
            WeatherState::Idle => String::new(),
            WeatherState::Loading => "加载中...".to_string(),
            WeatherState::Ready(report) => report.description.clone(),
            WeatherState::Failed(message) => format!("错误: {}", message),
        }
    }

    fn load_city_data(&mut self) {
        let generation = self.cities_token.issue();
        self.fetcher.request(
            WidgetId::Weather,
            RequestKind::Cities,
            generation,
            Source::from_location(&self.options.city_data_path),
        );
    }

    pub fn get_weather(&mut self) {
        let Some(city) = resolve_city(&self.input, &self.selected, &self.cities) else {
            tracing::error!("Invalid city name {:?}", self.input);
            self.state = WeatherState::Failed("请输入有效的城市名称".to_string());
            return;
        };

        self.state = WeatherState::Loading;
        let generation = self.weather_token.issue();
        let source = Source::from_location(&self.options.endpoint)
            .with_query("q", city)
            .with_query("appid", self.options.api_key.clone())
            .with_query("units", self.options.units.clone());
        self.fetcher.request(WidgetId::Weather, RequestKind::Weather, generation, source);
    }

    fn cycle_preset(&mut self) {
        if self.options.presets.is_empty() {
            return;
        }
        let next = self
            .options
            .presets
            .iter()
            .position(|p| p.value == self.selected)
            .map(|i| (i + 1) % self.options.presets.len())
            .unwrap_or(0);
        self.selected = self.options.presets[next].value.clone();
        self.input.clear();
        self.get_weather();
    }

    fn selected_label(&self) -> &str {
        self.options
            .presets
            .iter()
            .find(|p| p.value == self.selected)
            .map(|p| p.label.as_str())
            .unwrap_or(self.selected.as_str())
    }

    /// City names matching the text being typed
    pub fn suggestions(&self) -> Vec<&CityRecord> {
        let input = self.input.trim();
        if input.is_empty() {
            return Vec::new();
        }
        let lower = input.to_lowercase();
        self.cities
            .iter()
            .filter(|c| c.name.contains(input) || c.pinyin.to_lowercase().starts_with(&lower))
            .take(3)
            .collect()
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter => {
                self.editing = false;
                self.get_weather();
            }
            KeyCode::Esc => {
                self.editing = false;
                self.input.clear();
            }
            KeyCode::Tab => {
                if let Some(name) = self.suggestions().first().map(|c| c.name.clone()) {
                    self.input = name;
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        true
    }
}

impl Widget for WeatherWidget {
    fn id(&self) -> WidgetId {
        WidgetId::Weather
    }

    fn title(&self) -> String {
        "天气".to_string()
    }

    fn mount(&mut self) {
        // The query waits for the city list to settle
        self.state = WeatherState::Loading;
        self.load_city_data();
    }

    fn refresh(&mut self) {
        self.get_weather();
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.cities_token.invalidate();
        self.weather_token.invalidate();
    }

    fn on_delivery(&mut self, delivery: Delivery) {
        if self.disposed {
            return;
        }
        match delivery.kind {
            RequestKind::Cities => {
                if !self.cities_token.is_current(delivery.generation) {
                    return;
                }
                match delivery.result.and_then(parse_cities) {
                    Ok(cities) => {
                        tracing::debug!("Loaded {} cities", cities.len());
                        self.cities = cities;
                    }
                    Err(e) => tracing::error!("Failed to load city data: {}", e),
                }
                self.get_weather();
            }
            RequestKind::Weather => {
                if !self.weather_token.is_current(delivery.generation) {
                    tracing::debug!("Dropping stale weather #{}", delivery.generation);
                    return;
                }
                self.state = match delivery.result.and_then(WeatherReport::from_payload) {
                    Ok(report) => WeatherState::Ready(report),
                    Err(e) => {
                        tracing::error!("Failed to get weather: {}", e);
                        WeatherState::Failed(e.to_string())
                    }
                };
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.editing {
            return self.handle_input_key(key);
        }
        match key.code {
            KeyCode::Char('/') => {
                self.editing = true;
                true
            }
            KeyCode::Char('c') => {
                self.cycle_preset();
                true
            }
            KeyCode::Char('r') | KeyCode::Enter => {
                self.get_weather();
                true
            }
            _ => false,
        }
    }

    fn captures_input(&self) -> bool {
        self.editing
    }

    fn key_hints(&self) -> Vec<(&'static str, &'static str)> {
        if self.editing {
            vec![("Enter", "查询"), ("Tab", "补全"), ("Esc", "取消")]
        } else {
            vec![("c", "切换城市"), ("/", "输入城市"), ("r", "查询")]
        }
    }

    fn draw(&self, f: &mut Frame, area: Rect, focused: bool) {
        let block = widget_block(&self.title(), focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(2)])
            .split(inner);

        let label = Style::default().fg(text_dim());
        let value = Style::default().fg(text());

        let mut lines = Vec::new();
        match &self.state {
            WeatherState::Ready(report) => {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{}°C ", report.temp),
                        Style::default().fg(accent()).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("{} ", icon_glyph(&report.icon)), Style::default().fg(accent())),
                    Span::styled(report.description.clone(), value),
                ]));
                lines.push(Line::from(Span::styled(report.site.clone(), label)));
                lines.push(Line::from(""));
                let rows = [
                    ("体感温度", &report.feels_like),
                    ("风速", &report.wind),
                    ("风向", &report.wind_direction),
                    ("湿度", &report.humidity),
                    ("大气压", &report.pressure),
                    ("云量", &report.clouds),
                ];
                for (name, v) in rows {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{:<6}", name), label),
                        Span::styled(v.clone(), value),
                    ]));
                }
            }
            WeatherState::Failed(_) => {
                lines.push(Line::from(Span::styled(self.status_text(), Style::default().fg(danger()))));
            }
            _ => lines.push(Line::from(Span::styled(self.status_text(), label))),
        }
        f.render_widget(Paragraph::new(lines), chunks[0]);

        let input_line = if self.editing {
            let mut spans = vec![
                Span::styled("城市: ", label),
                Span::styled(format!("{}_", self.input), Style::default().fg(accent())),
            ];
            let names: Vec<&str> = self.suggestions().iter().map(|c| c.name.as_str()).collect();
            if !names.is_empty() {
                spans.push(Span::styled(format!("  {}", names.join(" ")), label));
            }
            Line::from(spans)
        } else {
            Line::from(vec![
                Span::styled("城市: ", label),
                Span::styled(
                    if self.input.is_empty() { self.selected_label().to_string() } else { self.input.clone() },
                    Style::default().fg(accent_bright()),
                ),
            ])
        };
        f.render_widget(Paragraph::new(vec![Line::from(""), input_line]), chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cities() -> Vec<CityRecord> {
        vec![
            CityRecord {
                name: "威海".to_string(),
                pinyin: "Weihai".to_string(),
                label: "威海市 山东".to_string(),
            },
            CityRecord {
                name: "武汉".to_string(),
                pinyin: "Wuhan".to_string(),
                label: "武汉市 湖北".to_string(),
            },
        ]
    }

    fn sample_payload() -> Value {
        json!({
            "cod": 200,
            "name": "Weihai",
            "sys": {"country": "CN"},
            "weather": [{"description": "Light Rain", "icon": "10d"}],
            "main": {"temp": 12.345, "feels_like": 10.6, "humidity": 81, "pressure": 1012},
            "wind": {"speed": 3.6, "deg": 200},
            "clouds": {"all": 75}
        })
    }

    #[test]
    fn test_resolve_city() {
        let cities = cities();
        assert_eq!(resolve_city("", "Weihai", &cities).as_deref(), Some("Weihai"));
        assert_eq!(resolve_city("  武汉 ", "Weihai", &cities).as_deref(), Some("Wuhan"));
        assert_eq!(resolve_city("山东", "Weihai", &cities).as_deref(), Some("Weihai"));
        assert_eq!(resolve_city("Paris", "Weihai", &cities).as_deref(), Some("Paris"));
        assert_eq!(resolve_city("火星", "Weihai", &cities), None);
        assert_eq!(resolve_city("", "", &cities), None);
    }

    #[test]
    fn test_chinese_selected_city_maps_to_pinyin() {
        let cities = cities();
        assert_eq!(resolve_city("", "武汉", &cities).as_deref(), Some("Wuhan"));
        // Before the city list loads the name goes out unchanged
        assert_eq!(resolve_city("", "武汉", &[]).as_deref(), Some("武汉"));
    }

    #[test]
    fn test_wind_level_steps() {
        assert_eq!(wind_level(0.0), 0);
        assert_eq!(wind_level(0.3), 1);
        assert_eq!(wind_level(3.6), 3);
        assert_eq!(wind_level(32.6), 11);
        assert_eq!(wind_level(32.7), 12);
        assert_eq!(wind_level(60.0), 12);
    }

    #[test]
    fn test_wind_direction() {
        assert_eq!(wind_direction(0.0), "北");
        assert_eq!(wind_direction(22.4), "北");
        assert_eq!(wind_direction(22.5), "东北");
        assert_eq!(wind_direction(200.0), "南");
        assert_eq!(wind_direction(350.0), "北");
        assert_eq!(wind_direction(720.0 + 90.0), "东");
    }

    #[test]
    fn test_translate_description() {
        assert_eq!(translate_description("Overcast Clouds"), "阴天");
        assert_eq!(translate_description("volcanic ash"), "volcanic ash");
    }

    #[test]
    fn test_report_from_payload() {
        let report = WeatherReport::from_payload(sample_payload()).unwrap();
        assert_eq!(report.description, "小雨");
        assert_eq!(report.temp, "12.3");
        assert_eq!(report.site, "Weihai / CN");
        assert_eq!(report.feels_like, "11°C");
        assert_eq!(report.wind, "3级 | 3.6 m/s");
        assert_eq!(report.wind_direction, "南");
        assert_eq!(report.clouds, "75%");
        assert_eq!(icon_glyph(&report.icon), "☂");
    }

    #[test]
    fn test_icon_glyph() {
        assert_eq!(icon_glyph("01n"), "☀");
        assert_eq!(icon_glyph("04d"), "☁");
        assert_eq!(icon_glyph("13d"), "❄");
        assert_eq!(icon_glyph(""), "·");
    }

    #[test]
    fn test_api_error_payload() {
        let err = WeatherReport::from_payload(json!({"cod": "404", "message": "city not found"})).unwrap_err();
        assert_eq!(err.to_string(), "city not found");

        let err = WeatherReport::from_payload(json!({})).unwrap_err();
        assert_eq!(err.to_string(), "无效的天气数据");
    }

    #[test]
    fn test_parse_cities_flattens_groups() {
        let payload = json!({"city": [
            {"list": [{"name": "威海", "pinyin": "Weihai", "label": "威海市"}]},
            {"list": [{"name": "武汉", "pinyin": "Wuhan", "label": "武汉市"}]}
        ]});
        let parsed = parse_cities(payload).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].pinyin, "Wuhan");

        assert!(parse_cities(json!({"cities": []})).is_err());
    }

    fn offline_widget() -> (WeatherWidget, tokio::sync::mpsc::UnboundedReceiver<Delivery>) {
        let (fetcher, rx) = Fetcher::new().unwrap();
        let options = WeatherOptions {
            endpoint: "/nonexistent/weather.json".to_string(),
            city_data_path: "/nonexistent/city.json".to_string(),
            ..WeatherOptions::default()
        };
        (WeatherWidget::new(options, fetcher), rx)
    }

    #[tokio::test]
    async fn test_failed_fetch_renders_error() {
        let (mut widget, mut rx) = offline_widget();
        widget.mount();
        assert_eq!(widget.status_text(), "加载中...");

        // City list fails, weather is still queried and fails too
        let cities = rx.recv().await.unwrap();
        widget.on_delivery(cities);
        let weather = rx.recv().await.unwrap();
        widget.on_delivery(weather);

        assert!(matches!(widget.state(), WeatherState::Failed(_)));
        assert!(widget.status_text().starts_with("错误: "));
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let (mut widget, mut rx) = offline_widget();

        widget.get_weather();
        widget.get_weather();
        let mut deliveries = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        deliveries.sort_by_key(|d| d.generation);

        // The newer request settles first, then the older one arrives
        let newer = deliveries.pop().unwrap();
        let older = deliveries.pop().unwrap();
        widget.on_delivery(Delivery {
            result: Ok(sample_payload()),
            ..newer
        });
        widget.on_delivery(older);

        assert!(matches!(widget.state(), WeatherState::Ready(_)));
    }

    #[tokio::test]
    async fn test_unknown_chinese_city_skips_request() {
        let (mut widget, _rx) = offline_widget();
        widget.handle_key(KeyEvent::from(KeyCode::Char('/')));
        assert!(widget.captures_input());
        for c in "火星".chars() {
            widget.handle_key(KeyEvent::from(KeyCode::Char(c)));
        }
        widget.handle_key(KeyEvent::from(KeyCode::Enter));

        assert!(!widget.captures_input());
        assert_eq!(widget.status_text(), "错误: 请输入有效的城市名称");
    }
}
