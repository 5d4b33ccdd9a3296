//! Terminal HTML page shown in the OAuth popup.
//!
//! The page posts a hint to `window.opener` and closes itself. The opener
//! must re-read the integration to learn the real state.

use uuid::Uuid;

use crate::models::ProviderType;
use crate::oauth::OAuthOutcome;

const MESSAGE_TYPE: &str = "integration-oauth";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render a `Connected` or `Failed` outcome. Redirects have no page.
pub fn render(outcome: &OAuthOutcome) -> Option<String> {
    match outcome {
        OAuthOutcome::Redirect(_) => None,
        OAuthOutcome::Connected {
            provider,
            integration_id,
            identity,
        } => {
            let detail = match identity {
                Some(identity) => format!(
                    "<p>Connected as <strong>{}</strong>.</p>",
                    escape_html(identity)
                ),
                None => String::new(),
            };
            Some(document(
                *provider,
                Some(*integration_id),
                "connected",
                &format!("{} Connected", provider.display_name()),
                &format!(
                    "{detail}<p>Your {} account has been connected. You can close this window.</p>",
                    provider.display_name()
                ),
                3000,
            ))
        }
        OAuthOutcome::Failed {
            provider,
            integration_id,
            message,
        } => Some(document(
            *provider,
            *integration_id,
            "failed",
            "Connection Failed",
            &format!(
                "<p>There was an error connecting your {} account:</p><p><strong>{}</strong></p>\
                 <p>Please try again.</p>",
                provider.display_name(),
                escape_html(message)
            ),
            5000,
        )),
    }
}

fn document(
    provider: ProviderType,
    integration_id: Option<Uuid>,
    status: &str,
    heading: &str,
    body: &str,
    close_after_ms: u32,
) -> String {
    // Uuid text is hex and dashes only, so it is safe inside the script literal.
    let integration = integration_id
        .map(|id| format!("\"{id}\""))
        .unwrap_or_else(|| "null".to_string());
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
      body {{ font-family: Arial, sans-serif; text-align: center; padding: 50px; }}
      .container {{ max-width: 420px; margin: 0 auto; }}
      .connected {{ color: #22c55e; }}
      .failed {{ color: #ef4444; }}
    </style>
  </head>
  <body>
    <div class="container">
      <h1 class="{status}">{heading}</h1>
      {body}
    </div>
    <script>
      if (window.opener) {{
        window.opener.postMessage({{ type: "{message_type}", provider: "{provider}", integrationId: {integration}, status: "{status}" }}, "*");
      }}
      setTimeout(function () {{ window.close(); }}, {close_after_ms});
    </script>
  </body>
</html>
"#,
        title = escape_html(heading),
        heading = escape_html(heading),
        message_type = MESSAGE_TYPE,
        provider = provider.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_text_is_escaped() {
        let page = render(&OAuthOutcome::Failed {
            provider: ProviderType::Github,
            integration_id: None,
            message: "<script>alert(1)</script>".into(),
        })
        .unwrap();
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!page.contains("<script>alert(1)"));
        assert!(page.contains("integrationId: null"));
        assert!(page.contains("status: \"failed\""));
    }

    #[test]
    fn connected_page_signals_opener() {
        let id = Uuid::nil();
        let page = render(&OAuthOutcome::Connected {
            provider: ProviderType::Notion,
            integration_id: id,
            identity: Some("Acme & Co".into()),
        })
        .unwrap();
        assert!(page.contains("type: \"integration-oauth\""));
        assert!(page.contains(&format!("integrationId: \"{id}\"")));
        assert!(page.contains("Acme &amp; Co"));
        assert!(page.contains("Notion Connected"));
    }
}
