use crate::query::params::ParamStack;

/// A row window derived from a 1-based page number.
///
/// Callers normalize `page >= 1` and `limit >= 1` first
/// (see [`ListFilter::normalized`](crate::filter::ListFilter::normalized)).
/// No upper bound is enforced on `limit`: an effectively unbounded page is
/// a supported configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

impl PageWindow {
    pub fn of(page: i64, limit: i64) -> Self {
        Self {
            offset: (page - 1) * limit,
            limit,
        }
    }

    /// Renders `OFFSET $n LIMIT $m`, binding both values after whatever the
    /// stack already holds.
    pub fn render(&self, stack: &mut ParamStack) -> String {
        let offset_idx = stack.push(self.offset);
        let limit_idx = stack.push(self.limit);
        format!("\n\t\tOFFSET ${} LIMIT ${}", offset_idx, limit_idx)
    }
}

/// `ceil(total_item / limit)`, 0 when there is nothing to page over.
pub fn total_pages(total_item: i64, limit: i64) -> i64 {
    if total_item <= 0 {
        return 0;
    }
    (total_item + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        assert_eq!(PageWindow::of(1, 10), PageWindow { offset: 0, limit: 10 });
        assert_eq!(PageWindow::of(3, 25), PageWindow { offset: 50, limit: 25 });
        assert_eq!(
            PageWindow::of(1, 100_000_000),
            PageWindow {
                offset: 0,
                limit: 100_000_000
            }
        );
    }

    #[test]
    fn render_appends_after_existing_params() {
        let mut stack = ParamStack::new();
        stack.push(5i64);
        let sql = PageWindow::of(2, 10).render(&mut stack);
        assert_eq!(sql, "\n\t\tOFFSET $2 LIMIT $3");
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(7, 3), 3);
    }
}
