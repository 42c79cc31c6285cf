//! Single-token literals: regex patterns and colour values

use crate::rules::{RuleContext, RuleMatch};
use regex::RegexBuilder;
use rendermux_core::Category;

const REGEX_METACHARS: &[char] = &[
    '\\', '.', '*', '+', '?', '[', ']', '(', ')', '{', '}', '|', '^', '$',
];

/// Rule: a `/pattern/flags` literal
///
/// The body must use at least one metacharacter, so `/s/` or a path fragment
/// is not mistaken for a pattern. Bodies the regex engine rejects still
/// classify, with lower confidence and `valid: false`.
pub fn pattern_rule(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let caps = ctx.patterns.regex_literal.captures(ctx.text)?;
    let body = caps.get(1)?;
    let flags = caps.get(2).map_or("", |m| m.as_str());

    if !body.as_str().contains(REGEX_METACHARS) {
        return None;
    }

    let valid = RegexBuilder::new(body.as_str())
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .is_ok();
    let confidence = if valid { 0.9 } else { 0.6 };

    Some(
        RuleMatch::whole(Category::PatternRule, confidence, ctx.text)
            .with_meta("pattern", body.as_str())
            .with_meta("flags", flags)
            .with_meta("valid", valid),
    )
}

/// An RGBA colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    /// `#rrggbb`, or `#rrggbbaa` when not opaque
    pub fn to_hex(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            let alpha = (self.a.clamp(0.0, 1.0) * 255.0).round() as u8;
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, alpha)
        }
    }
}

fn parse_alpha(value: Option<&str>) -> Option<f32> {
    match value {
        None => Some(1.0),
        Some(v) => {
            let alpha = match v.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => v.parse::<f32>().ok()?,
            };
            (0.0..=1.0).contains(&alpha).then_some(alpha)
        }
    }
}

fn parse_hex(digits: &str) -> Option<Rgba> {
    let expanded: String = if digits.len() <= 4 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };

    let channel = |i: usize| u8::from_str_radix(expanded.get(i * 2..i * 2 + 2)?, 16).ok();
    let a = match expanded.len() {
        8 => channel(3)? as f32 / 255.0,
        _ => 1.0,
    };

    Some(Rgba {
        r: channel(0)?,
        g: channel(1)?,
        b: channel(2)?,
        a,
    })
}

/// HSL (degrees, percent, percent) to RGB
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let s = s / 100.0;
    let l = l / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h % 360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());

    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let m = l - c / 2.0;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r1), to_byte(g1), to_byte(b1))
}

/// Rule: a single colour value in hex, `rgb()` or `hsl()` notation
pub fn swatch(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let patterns = ctx.patterns;
    let text = ctx.text;

    let (format, color) = if let Some(caps) = patterns.hex_color.captures(text) {
        ("hex", parse_hex(caps.get(1)?.as_str())?)
    } else if let Some(caps) = patterns.rgb_color.captures(text) {
        let channel = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
        (
            "rgb",
            Rgba {
                r: channel(1)?,
                g: channel(2)?,
                b: channel(3)?,
                a: parse_alpha(caps.get(4).map(|m| m.as_str()))?,
            },
        )
    } else if let Some(caps) = patterns.hsl_color.captures(text) {
        let value = |i: usize| caps.get(i)?.as_str().parse::<f32>().ok();
        let (h, s, l) = (value(1)?, value(2)?, value(3)?);
        if h > 360.0 || s > 100.0 || l > 100.0 {
            return None;
        }
        let (r, g, b) = hsl_to_rgb(h, s, l);
        (
            "hsl",
            Rgba {
                r,
                g,
                b,
                a: parse_alpha(caps.get(4).map(|m| m.as_str()))?,
            },
        )
    } else {
        return None;
    };

    Some(
        RuleMatch::whole(Category::Swatch, 0.95, text)
            .with_meta("format", format)
            .with_meta("normalized", color.to_hex())
            .with_meta("alpha", color.a as f64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_regex_literal() {
        let m = with_ctx("/ab+c/gi", pattern_rule).unwrap();
        assert_eq!(m.category, Category::PatternRule);
        assert_eq!(m.confidence, 0.9);
        assert_eq!(m.metadata["pattern"], "ab+c");
        assert_eq!(m.metadata["flags"], "gi");
        assert_eq!(m.metadata["valid"], true);
    }

    #[test]
    fn test_invalid_regex_lowers_confidence() {
        let m = with_ctx("/a(b/", pattern_rule).unwrap();
        assert_eq!(m.confidence, 0.6);
        assert_eq!(m.metadata["valid"], false);
    }

    #[test]
    fn test_plain_slashes() {
        assert!(with_ctx("/s/", pattern_rule).is_none());
        assert!(with_ctx("/usr/bin/", pattern_rule).is_none());
    }

    #[test]
    fn test_hex_swatch() {
        let m = with_ctx("#FA0", swatch).unwrap();
        assert_eq!(m.metadata["format"], "hex");
        assert_eq!(m.metadata["normalized"], "#ffaa00");

        let m = with_ctx("#11223380", swatch).unwrap();
        assert_eq!(m.metadata["normalized"], "#11223380");
    }

    #[test]
    fn test_rgb_swatch() {
        let m = with_ctx("rgb(255, 0, 128)", swatch).unwrap();
        assert_eq!(m.metadata["normalized"], "#ff0080");

        let m = with_ctx("rgba(0 0 0 / 50%)", swatch).unwrap();
        assert_eq!(m.metadata["normalized"], "#00000080");
    }

    #[test]
    fn test_hsl_swatch() {
        let m = with_ctx("hsl(120, 100%, 50%)", swatch).unwrap();
        assert_eq!(m.metadata["normalized"], "#00ff00");
    }

    #[test]
    fn test_out_of_range() {
        assert!(with_ctx("rgb(300, 0, 0)", swatch).is_none());
        assert!(with_ctx("hsl(400, 10%, 10%)", swatch).is_none());
        assert!(with_ctx("#12345", swatch).is_none());
    }
}
