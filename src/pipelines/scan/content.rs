// SPDX-License-Identifier: GPL-3.0-only

//! Classification of decoded QR payloads
//!
//! Presentation layers use this to offer a sensible action for a scan
//! (open a link, join a network, ...). Anything unrecognised is `Text`.

/// WiFi security type from a `WIFI:` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiSecurity {
    Open,
    Wep,
    Wpa,
    Wpa3,
}

impl WifiSecurity {
    fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "" | "NOPASS" => Self::Open,
            "WEP" => Self::Wep,
            "WPA3" | "SAE" => Self::Wpa3,
            _ => Self::Wpa,
        }
    }
}

/// Parsed meaning of a decoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum QrContent {
    Url(String),
    Wifi {
        ssid: String,
        password: Option<String>,
        security: WifiSecurity,
        hidden: bool,
    },
    Phone(String),
    Email(String),
    Geo {
        latitude: f64,
        longitude: f64,
    },
    Text(String),
}

impl QrContent {
    pub fn parse(payload: &str) -> Self {
        let text = payload.trim();

        if let Some(body) = text.strip_prefix("WIFI:") {
            return parse_wifi(body);
        }
        if text.starts_with("https://") || text.starts_with("http://") {
            return Self::Url(text.to_string());
        }
        if let Some(number) = text.strip_prefix("tel:") {
            return Self::Phone(number.to_string());
        }
        if let Some(rest) = text.strip_prefix("mailto:") {
            let address = rest.split('?').next().unwrap_or(rest);
            return Self::Email(address.to_string());
        }
        if let Some(rest) = text.strip_prefix("geo:")
            && let Some(geo) = parse_geo(rest)
        {
            return geo;
        }

        Self::Text(text.to_string())
    }

    /// Short label describing the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Wifi { .. } => "wifi",
            Self::Phone(_) => "phone",
            Self::Email(_) => "email",
            Self::Geo { .. } => "geo",
            Self::Text(_) => "text",
        }
    }
}

/// `S:<ssid>;T:<security>;P:<password>;H:<hidden>;;` with `\` escapes
fn parse_wifi(body: &str) -> QrContent {
    let mut ssid = String::new();
    let mut password = None;
    let mut security = WifiSecurity::Open;
    let mut hidden = false;

    for field in split_unescaped(body) {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key {
            "S" => ssid = value.to_string(),
            "P" if !value.is_empty() => password = Some(value.to_string()),
            "T" => security = WifiSecurity::parse(value),
            "H" => hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    QrContent::Wifi {
        ssid,
        password,
        security,
        hidden,
    }
}

/// Split on `;` while honouring backslash escapes; escapes are removed
fn split_unescaped(body: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ';' => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

fn parse_geo(rest: &str) -> Option<QrContent> {
    let coords = rest.split('?').next()?;
    let mut parts = coords.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    Some(QrContent::Geo {
        latitude,
        longitude,
    })
}
