use serde::Deserialize;

use crate::error::Error;

/// Per-entity pagination floor and fallback.
///
/// The request layer historically disables pagination by promoting any
/// too-small limit to a very large one, so the fallback is a configuration
/// choice, not a bug to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    /// Requested limits below this floor are replaced by `fallback`.
    pub floor: i64,
    pub fallback: i64,
}

impl PageDefaults {
    pub const DEFAULT: PageDefaults = PageDefaults {
        floor: 5,
        fallback: 100_000_000,
    };

    pub const fn new(floor: i64, fallback: i64) -> Self {
        Self { floor, fallback }
    }
}

/// Inbound list filter, parsed from the request layer.
///
/// Unknown `order_by`/`sort` values are resolved against the entity's
/// [`SortSpec`](crate::query::SortSpec) later; everything here only covers
/// the numeric normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub id: Option<String>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
    pub order_by: Option<String>,
    pub sort: Option<String>,
}

impl ListFilter {
    /// Applies the normalization rules in request order: `page < 1 -> 1`,
    /// `limit < floor -> fallback`.
    pub fn normalized(mut self, defaults: PageDefaults) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        if self.limit < defaults.floor {
            self.limit = defaults.fallback;
        }
        self
    }

    /// The exact-match id filter, coerced to an integer key.
    pub fn id_value(&self) -> Result<Option<i64>, Error> {
        match self.id.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| Error::Validation(format!("invalid id filter: {:?}", raw))),
        }
    }

    /// The substring-search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        match self.search.as_deref() {
            None | Some("") => None,
            term => term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_below_one_is_floored() {
        let f = ListFilter {
            page: 0,
            limit: 20,
            ..Default::default()
        };
        let f = f.normalized(PageDefaults::DEFAULT);
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, 20);
    }

    #[test]
    fn small_limit_promotes_to_fallback() {
        let f = ListFilter {
            page: 3,
            limit: 2,
            ..Default::default()
        };
        let f = f.normalized(PageDefaults::new(5, 100_000_000));
        assert_eq!(f.limit, 100_000_000);
        assert_eq!(f.page, 3);
    }

    #[test]
    fn omitted_limit_means_no_pagination() {
        let f = ListFilter::default().normalized(PageDefaults::DEFAULT);
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, 100_000_000);
    }

    #[test]
    fn id_filter_coercion() {
        let mut f = ListFilter::default();
        assert!(f.id_value().unwrap().is_none());

        f.id = Some("".to_string());
        assert!(f.id_value().unwrap().is_none());

        f.id = Some("42".to_string());
        assert_eq!(f.id_value().unwrap(), Some(42));

        f.id = Some("forty-two".to_string());
        assert!(matches!(f.id_value(), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_search_is_ignored() {
        let mut f = ListFilter::default();
        assert!(f.search_term().is_none());
        f.search = Some(String::new());
        assert!(f.search_term().is_none());
        f.search = Some("garden".to_string());
        assert_eq!(f.search_term(), Some("garden"));
    }
}
