//! Responses generated in-process when neither network nor cache can answer.
//!
//! None of these touch the network or a store, so they cannot fail.

use crate::http::Response;

const PLACEHOLDER_WIDTH: u32 = 200;
const PLACEHOLDER_HEIGHT: u32 = 150;

/// Gradient SVG with the application label, served in place of a missing image.
pub fn placeholder_image(label: &str) -> Response {
  let svg = format!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><defs><linearGradient id="grad"><stop offset="0%" style="stop-color:#8B5CF6"/><stop offset="100%" style="stop-color:#A855F7"/></linearGradient></defs><rect width="{w}" height="{h}" fill="url(#grad)"/><text x="{cx}" y="{cy}" text-anchor="middle" fill="white" font-family="Arial" font-size="16">{label}</text></svg>"##,
    w = PLACEHOLDER_WIDTH,
    h = PLACEHOLDER_HEIGHT,
    cx = PLACEHOLDER_WIDTH / 2,
    cy = PLACEHOLDER_HEIGHT / 2 + 5,
    label = escape_markup(label),
  );

  Response::new(200, svg).with_header("Content-Type", "image/svg+xml")
}

/// JSON error body for an API request that could not be served.
pub fn api_unavailable() -> Response {
  Response::new(503, r#"{"error": "Network unavailable"}"#)
    .with_header("Content-Type", "application/json")
}

/// Plain-text failure for a generic resource that is neither reachable nor cached.
pub fn resource_unavailable() -> Response {
  Response::new(503, "Resource not available offline")
    .with_status_text("Service Unavailable")
    .with_header("Content-Type", "text/plain; charset=utf-8")
}

/// Self-contained offline page that reloads itself once connectivity returns.
pub fn offline_page(label: &str, version: &str) -> Response {
  let html = OFFLINE_TEMPLATE
    .replace("{label}", &escape_markup(label))
    .replace("{version}", &escape_markup(version));

  Response::new(200, html).with_header("Content-Type", "text/html; charset=utf-8")
}

/// Visible text marking the offline page.
pub const OFFLINE_INDICATOR: &str = "You are offline";

const OFFLINE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{label} - offline</title>
  <style>
    body {
      font-family: system-ui, sans-serif;
      background: linear-gradient(135deg, #8B5CF6, #06B6D4);
      color: white;
      text-align: center;
      padding: 50px 20px;
      margin: 0;
      min-height: 100vh;
      display: flex;
      flex-direction: column;
      justify-content: center;
      align-items: center;
    }
    .offline-container {
      max-width: 400px;
      background: rgba(255, 255, 255, 0.1);
      border-radius: 20px;
      padding: 40px;
      border: 1px solid rgba(255, 255, 255, 0.2);
    }
    .logo { font-size: 48px; font-weight: 800; margin-bottom: 20px; }
    p { margin-bottom: 30px; opacity: 0.9; line-height: 1.6; }
    .retry-btn {
      background: rgba(255, 255, 255, 0.2);
      border: 2px solid white;
      color: white;
      padding: 12px 24px;
      border-radius: 25px;
      font-weight: 600;
      cursor: pointer;
    }
    .version { margin-top: 20px; font-size: 14px; opacity: 0.8; }
  </style>
</head>
<body>
  <div class="offline-container">
    <div class="logo">{label}</div>
    <h1>You are offline</h1>
    <p>Your connection appears to be down. Browsing will resume as soon as it is back.</p>
    <button class="retry-btn" onclick="window.location.reload()">Try again</button>
    <div class="version">Version {version}</div>
  </div>
  <script>
    window.addEventListener('online', () => {
      window.location.reload();
    });
  </script>
</body>
</html>
"#;

fn escape_markup(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_placeholder_is_svg() {
    let response = placeholder_image("clashy");
    assert_eq!(response.header("Content-Type"), Some("image/svg+xml"));
    let body = response.text();
    assert!(body.starts_with("<svg"));
    assert!(body.contains(r#"width="200" height="150""#));
    assert!(body.contains(">clashy</text>"));
  }

  #[test]
  fn test_offline_page_has_indicator_and_listener() {
    let response = offline_page("clashy", "2.1.1");
    let body = response.text();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(OFFLINE_INDICATOR));
    assert!(body.contains("addEventListener('online'"));
    assert!(body.contains("Version 2.1.1"));
    assert!(body.trim_end().ends_with("</html>"));
  }

  #[test]
  fn test_labels_are_escaped() {
    let body = offline_page("<b>&co</b>", "1").text().into_owned();
    assert!(body.contains("&lt;b&gt;&amp;co&lt;/b&gt;"));
    assert!(!body.contains("<b>"));
  }

  #[test]
  fn test_error_statuses() {
    let api = api_unavailable();
    assert_eq!(api.status, 503);
    let json: serde_json::Value = serde_json::from_slice(&api.body).unwrap();
    assert_eq!(json["error"], "Network unavailable");

    let resource = resource_unavailable();
    assert_eq!(resource.status, 503);
    assert_eq!(resource.status_text, "Service Unavailable");
  }
}
