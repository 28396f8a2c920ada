#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Fixed allow-list mapping public sort keys to column expressions.
///
/// Unknown keys and directions resolve to the entity's defaults instead of
/// failing. The client-supplied key is only ever used as a map lookup; the
/// spliced identifier always comes from this table.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub keys: &'static [(&'static str, &'static str)],
    pub default_key: &'static str,
    pub default_dir: SortDir,
}

impl SortSpec {
    pub const fn new(
        keys: &'static [(&'static str, &'static str)],
        default_key: &'static str,
        default_dir: SortDir,
    ) -> Self {
        Self {
            keys,
            default_key,
            default_dir,
        }
    }

    /// Resolves a requested key to its column expression, defaulting when the
    /// key is missing or not allow-listed.
    pub fn column(&self, requested: Option<&str>) -> &'static str {
        let key = match requested {
            Some(k) if !k.is_empty() => k,
            _ => self.default_key,
        };
        self.keys
            .iter()
            .find(|(public, _)| *public == key)
            .or_else(|| self.keys.iter().find(|(public, _)| *public == self.default_key))
            .map(|(_, column)| *column)
            .unwrap_or(self.default_key)
    }

    /// Resolves a requested direction, defaulting on anything but ASC/DESC.
    pub fn direction(&self, requested: Option<&str>) -> SortDir {
        match requested.map(|s| s.to_ascii_uppercase()) {
            Some(s) if s == "ASC" => SortDir::Asc,
            Some(s) if s == "DESC" => SortDir::Desc,
            _ => self.default_dir,
        }
    }

    pub fn order_clause(&self, order_by: Option<&str>, sort: Option<&str>) -> String {
        format!(
            "\n\t\tORDER BY {} {}",
            self.column(order_by),
            self.direction(sort).as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: SortSpec = SortSpec::new(
        &[
            ("id", r#""p"."id""#),
            ("heading", r#""p"."heading""#),
            ("created_at", r#""p"."created_at""#),
        ],
        "created_at",
        SortDir::Desc,
    );

    #[test]
    fn known_keys_map_to_their_columns() {
        assert_eq!(SPEC.column(Some("heading")), r#""p"."heading""#);
        assert_eq!(SPEC.column(Some("id")), r#""p"."id""#);
    }

    #[test]
    fn unknown_key_falls_back_to_default_column() {
        assert_eq!(SPEC.column(Some("bogus")), r#""p"."created_at""#);
        assert_eq!(SPEC.column(None), r#""p"."created_at""#);
        assert_eq!(SPEC.column(Some("")), r#""p"."created_at""#);
        // Raw input never reaches the identifier position.
        assert!(!SPEC.column(Some("id; DROP TABLE")).contains("DROP"));
    }

    #[test]
    fn direction_parsing_is_case_insensitive_with_default() {
        assert_eq!(SPEC.direction(Some("asc")), SortDir::Asc);
        assert_eq!(SPEC.direction(Some("DESC")), SortDir::Desc);
        assert_eq!(SPEC.direction(Some("sideways")), SortDir::Desc);
        assert_eq!(SPEC.direction(None), SortDir::Desc);
    }

    #[test]
    fn order_clause_uses_resolved_parts() {
        assert_eq!(
            SPEC.order_clause(Some("bogus"), Some("sideways")),
            "\n\t\tORDER BY \"p\".\"created_at\" DESC"
        );
        assert_eq!(
            SPEC.order_clause(Some("heading"), Some("asc")),
            "\n\t\tORDER BY \"p\".\"heading\" ASC"
        );
    }
}
