//! Static login and consent forms.

use url::form_urlencoded::byte_serialize;

const LOGIN_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<p>No valid client certificate was presented. Sign in with your password.</p>
<form method="post" action="/login?login_challenge={{challenge}}">
  <label>Username <input type="text" name="username" autocomplete="username" required></label>
  <label>Password <input type="password" name="password" autocomplete="current-password" required></label>
  <button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

const CONSENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Authorize access</title></head>
<body>
<h1>Authorize access</h1>
<p>{{subject}}, the application requests the following scopes:</p>
<form method="post" action="/consent?consent_challenge={{challenge}}">
  <input type="hidden" name="scope_selection" value="1">
{{scopes}}  <button type="submit">Allow</button>
</form>
</body>
</html>
"#;

/// Escapes text nodes and double-quoted attribute values. No crate in the
/// dependency tree offers HTML escaping, and these pages need only the five
/// significant characters.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn encode_query_value(raw: &str) -> String {
    byte_serialize(raw.as_bytes()).collect()
}

pub fn login_page(challenge: &str) -> String {
    LOGIN_TEMPLATE.replace("{{challenge}}", &encode_query_value(challenge))
}

pub fn consent_page(challenge: &str, subject: &str, requested_scope: &[String]) -> String {
    let scopes: String = requested_scope
        .iter()
        .map(|scope| {
            let scope = escape_html(scope);
            format!(
                "  <label><input type=\"checkbox\" name=\"grant_scope\" value=\"{0}\" checked> {0}</label><br>\n",
                scope
            )
        })
        .collect();

    CONSENT_TEMPLATE
        .replace("{{challenge}}", &encode_query_value(challenge))
        .replace("{{subject}}", &escape_html(subject))
        .replace("{{scopes}}", &scopes)
}
