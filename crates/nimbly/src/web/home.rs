//! Human-facing status page.
//!
//! Shows the authentication state in a readable form and links to the
//! metrics endpoints, the auth flow, and (when enabled) the debug views.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use chrono::Utc;

use super::AppState;

const NETATMO_DEV_SITE: &str = "https://dev.netatmo.com/apps/";

pub async fn home(State(state): State<Arc<AppState>>) -> Html<String> {
    let now = Utc::now();
    let token = state.auth.current();

    let auth_section = match token {
        Some(ref t) if t.is_valid(now) => {
            let expiry = t.expires_at.map_or_else(
                || "never".to_owned(),
                |e| {
                    let remaining = (e - now).num_seconds();
                    format!("{} (in {remaining}s)", e.to_rfc3339())
                },
            );
            format!(
                "<p>Authenticated. Token expires: {expiry}</p>\n\
                 <form action=\"/auth/deletetoken\" method=\"post\">\n\
                 <button type=\"submit\">Delete token</button>\n\
                 </form>"
            )
        }
        Some(_) => "<p>Token held but not currently valid; it will be refreshed on the next \
                    scrape.</p>"
            .to_owned(),
        None => format!(
            "<p>Not authenticated.</p>\n\
             <p><a href=\"/auth/authorize\">Authenticate with Netatmo</a> \
             (requires an application from <a href=\"{NETATMO_DEV_SITE}\">the Netatmo dev \
             site</a>)</p>\n\
             <form action=\"/auth/settoken\" method=\"post\">\n\
             <label>Or paste a refresh token: \
             <input type=\"password\" name=\"refresh_token\"></label>\n\
             <button type=\"submit\">Set token</button>\n\
             </form>"
        ),
    };

    let debug_links = if state.settings.debug_handlers {
        "<li><a href=\"/debug/data\">Cached data (JSON)</a></li>\n\
         <li><a href=\"/debug/token\">Token info (JSON)</a></li>"
    } else {
        ""
    };

    Html(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>nimbly</title></head>\n\
         <body>\n\
         <h1>nimbly</h1>\n\
         <p>Prometheus exporter for Netatmo sensors.</p>\n\
         {auth_section}\n\
         <ul>\n\
         <li><a href=\"/metrics/v2\">Metrics (unified labels)</a></li>\n\
         <li><a href=\"/metrics/v1\">Metrics (legacy labels)</a></li>\n\
         {debug_links}\n\
         </ul>\n\
         </body>\n\
         </html>"
    ))
}
