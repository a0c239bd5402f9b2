fn group_thousands(digits: &str) -> String {
    let mut with_commas = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Integer count with thousands separators: 12,345
pub fn count(n: usize) -> String {
    group_thousands(&n.to_string())
}

/// Weight in kilograms with thousands separators: 1,234.50 kg
pub fn kg(val: f64) -> String {
    let fixed = format!("{:.2}", val.abs());
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}{}.{dec_part} kg", group_thousands(int_part))
}

/// Share of `part` in `whole` as a percentage, one decimal.
pub fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.0%".into();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_formatting() {
        assert_eq!(count(0), "0");
        assert_eq!(count(999), "999");
        assert_eq!(count(1000), "1,000");
        assert_eq!(count(1234567), "1,234,567");
    }

    #[test]
    fn test_kg_formatting() {
        assert_eq!(kg(1234.5), "1,234.50 kg");
        assert_eq!(kg(0.0), "0.00 kg");
        assert_eq!(kg(-12.5), "-12.50 kg");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), "25.0%");
        assert_eq!(percent(3, 0), "0.0%");
    }
}
