/// Constraint tags parsed from a field's raw constraint string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub unique: bool,
    pub has_default: bool,
}

impl Constraints {
    /// Parse tags out of SQL-ish constraint text such as `"PRIMARY KEY AUTO_INCREMENT"`
    /// or `"NOT_NULL, DEFAULT 0"`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_ascii_uppercase().replace(',', " ");
        let tokens: Vec<&str> = upper.split_whitespace().collect();
        let pair = |a: &str, b: &str| tokens.windows(2).any(|w| w[0] == a && w[1] == b);

        Self {
            primary_key: pair("PRIMARY", "KEY"),
            auto_increment: tokens.contains(&"AUTO_INCREMENT"),
            not_null: tokens.contains(&"NOT_NULL") || pair("NOT", "NULL"),
            unique: tokens.contains(&"UNIQUE"),
            has_default: tokens.contains(&"DEFAULT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_tags() {
        let c = Constraints::parse("PRIMARY KEY AUTO_INCREMENT");
        assert!(c.primary_key && c.auto_increment);
        assert!(!c.not_null && !c.unique && !c.has_default);
    }

    #[test]
    fn accepts_commas_and_internal_not_null_marker() {
        let c = Constraints::parse("not_null, unique, default 'x'");
        assert!(c.not_null && c.unique && c.has_default);
        assert!(Constraints::parse("NOT NULL").not_null);
    }

    #[test]
    fn empty_text_has_no_tags() {
        assert_eq!(Constraints::parse(""), Constraints::default());
    }
}
