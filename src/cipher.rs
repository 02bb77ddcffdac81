//! Decoding of obfuscated image URLs.
//!
//! Baidu's `acjson` payloads carry `objURL` values scrambled by two fixed
//! layers: multi-character tokens standing in for the URL separators, and a
//! positional substitution alphabet over the remaining characters. Both
//! layers are static, so decoding is pure and total: unknown symbols pass
//! through untouched and nothing here can fail.

use url::Url;

/// Layer 1: separator tokens. These must be replaced before the character
/// layer runs, because the tokens themselves contain alphabet symbols.
const TOKENS: [(&str, &str); 3] = [("_z2C$q", ":"), ("_z&e3B", "."), ("AzdH3F", "/")];

/// Layer 2: positional substitution alphabet (33 symbols).
const SCRAMBLED: &[u8] = b"0123456789abcdefghijklmnopqrstuvw";
const PLAIN: &[u8] = b"7dgjmoru140852vsnkheb963wtqplifca";

/// Decode one obfuscated URL: token layer first, then the character layer.
pub fn deobfuscate_url(obfuscated: &str) -> String {
    let mut url = obfuscated.to_string();
    for (token, replacement) in TOKENS {
        url = url.replace(token, replacement);
    }
    url.chars().map(translate).collect()
}

fn translate(c: char) -> char {
    if c.is_ascii() {
        if let Some(pos) = SCRAMBLED.iter().position(|&b| b == c as u8) {
            return PLAIN[pos] as char;
        }
    }
    c
}

/// Percent-decode a URL, replacing invalid UTF-8 sequences lossily.
pub fn percent_decode(url: &str) -> String {
    percent_encoding::percent_decode_str(url)
        .decode_utf8_lossy()
        .into_owned()
}

/// Unwrap a forwarding URL of the form `…?src=<real>&refer=…` to its inner
/// value, percent-decoded. URLs without a `src` component pass through.
pub fn unwrap_forwarded(url: &str) -> String {
    if !url.contains("src=") {
        return url.to_string();
    }

    if let Ok(parsed) = Url::parse(url) {
        let src = parsed
            .query_pairs()
            .find(|(key, _)| key == "src")
            .map(|(_, value)| value.into_owned());
        if let Some(inner) = src {
            if !inner.is_empty() {
                return inner;
            }
        }
    }

    // Raw split for inputs Url::parse rejects or mis-places.
    match url.split_once("src=") {
        Some((_, tail)) => {
            let inner = tail.split("&refer=").next().unwrap_or(tail);
            percent_decode(inner)
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_layer_runs_before_character_layer() {
        // The token decodes as a unit. If the character layer ran first it
        // would rewrite the `2` and `q` inside and the token would survive.
        assert_eq!(deobfuscate_url("_z2C$q"), ":");
        assert_eq!(deobfuscate_url("_z&e3B"), ".");
        assert_eq!(deobfuscate_url("AzdH3F"), "/");
    }

    #[test]
    fn test_full_round_trip_fixture() {
        let scrambled = "ipprf_z2C$qAzdH3FAzdH3Ft42_z&e3Bjxw4rsj_z&e3Bv54AzdH3Fri5p5-8_z&e3B3r2";
        assert_eq!(deobfuscate_url(scrambled), "https://img.example.com/photo-1.jpg");
    }

    #[test]
    fn test_unknown_symbols_pass_through() {
        assert_eq!(deobfuscate_url("XYZ-%$xyz"), "XYZ-%$xyz");
        assert_eq!(deobfuscate_url(""), "");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("caf%C3%A9%20bar"), "café bar");
        assert_eq!(percent_decode("plain"), "plain");
    }

    #[test]
    fn test_unwrap_forwarded_extracts_encoded_src() {
        let wrapped = "https://x/y?src=https%3A%2F%2Freal.example%2Fimg.jpg&refer=z";
        assert_eq!(unwrap_forwarded(wrapped), "https://real.example/img.jpg");
    }

    #[test]
    fn test_unwrap_forwarded_handles_decoded_src() {
        // After percent-decoding the whole URL the inner value is plain.
        let wrapped = "https://gimg2.example.com/f?src=https://cdn.example.com/a.png&refer=http://r";
        assert_eq!(unwrap_forwarded(wrapped), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_unwrap_forwarded_raw_fallback() {
        let malformed = "forward?src=https%3A%2F%2Fa.example%2Fc.png&refer=x";
        assert_eq!(unwrap_forwarded(malformed), "https://a.example/c.png");
    }

    #[test]
    fn test_unwrap_forwarded_passthrough() {
        let plain = "https://cdn.example.com/direct.jpg";
        assert_eq!(unwrap_forwarded(plain), plain);
    }
}
