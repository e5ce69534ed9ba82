//! Text conventions of the Kerkythea XML format.

use std::borrow::Cow;

/// Escape the XML metacharacters `& < > " '` for use in an attribute value.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(|c| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Fixed-point with `decimals` digits, e.g. `fixed(0.5, 4) == "0.5000"`.
pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

/// Shortest round-trip decimal, always with a fractional part
/// (`1.0`, `0.8470588235294118`), switching to exponent form outside
/// `1e-4..1e16` (`1.0e-05`).
pub fn real(value: f64) -> String {
    let magnitude = value.abs();
    if !value.is_finite() || magnitude == 0.0 || (1e-4..1e16).contains(&magnitude) {
        return format!("{:?}", value);
    }

    let formatted = format!("{:e}", value);
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.to_string()
    } else {
        format!("{}.0", mantissa)
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

/// Space-separated colour channels in 0-1, each formatted with [`real`].
pub fn rgb(channels: [f64; 3]) -> String {
    format!("{} {} {}", real(channels[0]), real(channels[1]), real(channels[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("Wood"), "Wood");
        assert!(matches!(escape("Wood"), Cow::Borrowed(_)));
        assert_eq!(
            escape(r#"A&B <C> "D" 'E'"#),
            "A&amp;B &lt;C&gt; &quot;D&quot; &apos;E&apos;"
        );
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fixed(0.0254, 4), "0.0254");
        assert_eq!(fixed(1.0, 8), "1.00000000");
        assert_eq!(fixed(-2.5, 6), "-2.500000");
        assert_eq!(fixed(3.0, 0), "3");
    }

    #[test]
    fn test_real() {
        assert_eq!(real(1.0), "1.0");
        assert_eq!(real(0.0), "0.0");
        assert_eq!(real(216.0 / 255.0), "0.8470588235294118");
        assert_eq!(real(-12.5), "-12.5");
        assert_eq!(real(0.00001), "1.0e-05");
        assert_eq!(real(2.5e20), "2.5e+20");
    }

    #[test]
    fn test_rgb() {
        assert_eq!(rgb([1.0, 0.0, 0.5]), "1.0 0.0 0.5");
    }
}
