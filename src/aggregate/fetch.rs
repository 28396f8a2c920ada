use std::time::Duration;

use sqlx::PgPool;

use crate::aggregate::{Aggregate, ChildSpec, Page};
use crate::error::Error;
use crate::filter::ListFilter;
use crate::query::{PageWindow, ParamStack, Predicate, PredicateSet, total_pages};

/// Deadline for one read statement.
pub(crate) const STATEMENT_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) async fn with_timeout<T>(
    op: &str,
    deadline: Duration,
    fut: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(deadline, fut).await {
        Err(_) => Err(Error::Timeout(op.to_string())),
        Ok(res) => res.map_err(|err| Error::storage(op, err)),
    }
}

/// The standard predicates every list filter carries: exact id, substring
/// search over the entity's text columns.
pub(crate) fn filter_predicates<A: Aggregate>(filter: &ListFilter) -> Result<PredicateSet, Error> {
    let mut set = PredicateSet::new();
    if let Some(id) = filter.id_value()? {
        set.push(Predicate::eq(
            &format!(r#""{}"."id""#, A::ALIAS),
            id,
        ));
    }
    if let Some(term) = filter.search_term() {
        if !A::SEARCH_COLUMNS.is_empty() {
            set.push(Predicate::search(A::ALIAS, A::SEARCH_COLUMNS, term));
        }
    }
    Ok(set)
}

fn projection(alias: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!(r#""{}".*"#, alias);
    }
    columns
        .iter()
        .map(|col| format!(r#""{}"."{}""#, alias, col))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One correlated sub-select per child collection, recursing into
/// grandchildren, each array COALESCEd to `'[]'::json` so decoded
/// collections are never null.
fn child_subselect(spec: &ChildSpec, parent_alias: &str) -> String {
    let mut inner = projection(spec.alias, spec.columns);
    for grandchild in spec.children {
        inner.push(',');
        inner.push_str(&child_subselect(grandchild, spec.alias));
    }
    format!(
        r#"
		(
			SELECT
				COALESCE(array_to_json(array_agg("{alias}")), '[]'::json)
			FROM (
				SELECT
					{inner}
				FROM "{table}" "{alias}"
				WHERE "{alias}"."{fk}" = "{parent}"."id"
				ORDER BY "{alias}"."id"
			) AS "{alias}"
		) AS "{field}""#,
        alias = spec.alias,
        inner = inner,
        table = spec.table,
        fk = spec.fk,
        parent = parent_alias,
        field = spec.field,
    )
}

fn select_sql<A: Aggregate>(where_sql: &str, order_sql: &str, page_sql: &str) -> String {
    let mut children = String::new();
    for child in A::CHILDREN {
        children.push(',');
        children.push_str(&child_subselect(child, A::ALIAS));
    }
    format!(
        r#"
	SELECT
		array_to_json(array_agg("t"))
	FROM (
		SELECT
			"{alias}".*{children}
		FROM "{table}" "{alias}"
		WHERE 1 = 1{where_sql}{order_sql}{page_sql}
	) AS "t";"#,
        alias = A::ALIAS,
        children = children,
        table = A::TABLE,
    )
}

fn count_sql<A: Aggregate>(where_sql: &str) -> String {
    format!(
        r#"
	SELECT
		COUNT(*) AS "count"
	FROM "{table}" "{alias}"
	WHERE 1 = 1{where_sql};"#,
        table = A::TABLE,
        alias = A::ALIAS,
    )
}

async fn fetch_documents<A: Aggregate>(
    pool: &PgPool,
    op: &str,
    predicates: &PredicateSet,
    order_sql: &str,
    window: Option<PageWindow>,
) -> Result<Vec<A>, Error> {
    let mut stack = ParamStack::new();
    let where_sql = predicates.render(&mut stack);
    let page_sql = window
        .map(|w| w.render(&mut stack))
        .unwrap_or_default();
    let sql = select_sql::<A>(&where_sql, order_sql, &page_sql);
    tracing::debug!(table = A::TABLE, sql = %sql, "find query");

    let raw: Option<serde_json::Value> = with_timeout(
        op,
        STATEMENT_TIMEOUT,
        stack
            .bind_scalar(sqlx::query_scalar(&sql))
            .fetch_one(pool),
    )
    .await?;

    match raw {
        None => Ok(Vec::new()),
        Some(document) => serde_json::from_value(document).map_err(|err| Error::decode(op, err)),
    }
}

/// One read per call: parent columns plus every child collection, already
/// nested. Always returns a well-formed (possibly empty) list.
pub(crate) async fn fetch_page<A: Aggregate>(
    pool: &PgPool,
    filter: &ListFilter,
    extra: PredicateSet,
) -> Result<Page<A>, Error> {
    let op = format!("find {}", A::TABLE);
    let filter = filter.clone().normalized(A::PAGE);

    let mut predicates = filter_predicates::<A>(&filter)?;
    predicates.extend(extra);

    let order_sql = A::SORT.order_clause(filter.order_by.as_deref(), filter.sort.as_deref());
    let window = PageWindow::of(filter.page, filter.limit);
    let data = fetch_documents::<A>(pool, &op, &predicates, &order_sql, Some(window)).await?;
    let total_item = fetch_count_inner::<A>(pool, &predicates).await?;

    Ok(Page {
        data,
        page: filter.page,
        limit: filter.limit,
        total_item,
        total_page: total_pages(total_item, filter.limit),
    })
}

/// Single-entity fetch; zero rows is a distinct `NotFound`, not an empty
/// success.
pub(crate) async fn fetch_one<A: Aggregate>(pool: &PgPool, id: i64) -> Result<A, Error> {
    let op = format!("find one {}", A::TABLE);

    let mut predicates = PredicateSet::new();
    predicates.push(Predicate::eq(&format!(r#""{}"."id""#, A::ALIAS), id));

    let order_sql = A::SORT.order_clause(None, None);
    let mut rows = fetch_documents::<A>(pool, &op, &predicates, &order_sql, None).await?;
    if rows.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(rows.remove(0))
}

async fn fetch_count_inner<A: Aggregate>(
    pool: &PgPool,
    predicates: &PredicateSet,
) -> Result<i64, Error> {
    let op = format!("count {}", A::TABLE);
    let mut stack = ParamStack::new();
    let where_sql = predicates.render(&mut stack);
    let sql = count_sql::<A>(&where_sql);

    with_timeout(
        &op,
        STATEMENT_TIMEOUT,
        stack
            .bind_scalar(sqlx::query_scalar::<_, i64>(&sql))
            .fetch_one(pool),
    )
    .await
}

/// Scalar row count under the same predicate logic as the page fetch.
pub(crate) async fn fetch_count<A: Aggregate>(
    pool: &PgPool,
    filter: &ListFilter,
    extra: PredicateSet,
) -> Result<i64, Error> {
    let filter = filter.clone().normalized(A::PAGE);
    let mut predicates = filter_predicates::<A>(&filter)?;
    predicates.extend(extra);
    fetch_count_inner::<A>(pool, &predicates).await
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::aggregate::Attachment;
    use crate::query::{SortDir, SortSpec};

    #[derive(Debug, Deserialize)]
    struct Listing {
        #[allow(dead_code)]
        id: i64,
        #[allow(dead_code)]
        heading: String,
        #[allow(dead_code)]
        listing_images: Vec<Attachment>,
        #[allow(dead_code)]
        floors: Vec<Floor>,
    }

    #[derive(Debug, Deserialize)]
    struct Floor {
        #[allow(dead_code)]
        id: i64,
        #[allow(dead_code)]
        floor_images: Vec<Attachment>,
    }

    impl Aggregate for Listing {
        const TABLE: &'static str = "listings";
        const ALIAS: &'static str = "l";
        const SEARCH_COLUMNS: &'static [&'static str] = &["heading"];
        const CHILDREN: &'static [ChildSpec] = &[
            ChildSpec {
                field: "listing_images",
                table: "listing_images",
                alias: "li",
                fk: "listing_id",
                columns: &["id", "filename", "url"],
                children: &[],
            },
            ChildSpec {
                field: "floors",
                table: "listing_floors",
                alias: "lf",
                fk: "listing_id",
                columns: &[],
                children: &[ChildSpec {
                    field: "floor_images",
                    table: "listing_floor_images",
                    alias: "lfi",
                    fk: "floor_id",
                    columns: &["id", "filename", "url"],
                    children: &[],
                }],
            },
        ];
        const SORT: SortSpec = SortSpec::new(
            &[("id", r#""l"."id""#), ("created_at", r#""l"."created_at""#)],
            "created_at",
            SortDir::Desc,
        );
    }

    #[test]
    fn select_shape_nests_children_and_grandchildren() {
        let sql = select_sql::<Listing>("", "\n\t\tORDER BY \"l\".\"id\" ASC", "");

        assert!(sql.contains(r#"array_to_json(array_agg("t"))"#));
        assert!(sql.contains(r#"FROM "listings" "l""#));
        assert!(sql.contains(r#"COALESCE(array_to_json(array_agg("li")), '[]'::json)"#));
        assert!(sql.contains(r#""li"."listing_id" = "l"."id""#));
        // Grandchild correlates against its own parent, not the root.
        assert!(sql.contains(r#""lfi"."floor_id" = "lf"."id""#));
        assert!(sql.contains(r#"AS "floors""#));
        assert!(sql.contains("WHERE 1 = 1"));
    }

    #[test]
    fn explicit_columns_are_projected_and_empty_means_star() {
        let sql = select_sql::<Listing>("", "", "");
        assert!(sql.contains(r#""li"."id", "li"."filename", "li"."url""#));
        assert!(sql.contains(r#""lf".*"#));
    }

    #[test]
    fn count_shape_shares_the_where_clause() {
        let filter = ListFilter {
            id: Some("7".to_string()),
            search: Some("lake".to_string()),
            ..Default::default()
        };
        let predicates = filter_predicates::<Listing>(&filter).unwrap();

        let mut stack = ParamStack::new();
        let where_sql = predicates.render(&mut stack);
        let sql = count_sql::<Listing>(&where_sql);

        assert!(sql.contains(r#"COUNT(*) AS "count""#));
        assert!(sql.contains(r#"AND "l"."id" = $1"#));
        assert!(sql.contains(r#"LOWER("l"."heading") LIKE $2"#));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn pagination_placeholders_continue_the_numbering() {
        let filter = ListFilter {
            search: Some("lake".to_string()),
            page: 2,
            limit: 10,
            ..Default::default()
        };
        let predicates = filter_predicates::<Listing>(&filter).unwrap();

        let mut stack = ParamStack::new();
        let where_sql = predicates.render(&mut stack);
        let page_sql = PageWindow::of(filter.page, filter.limit).render(&mut stack);
        let sql = select_sql::<Listing>(&where_sql, "", &page_sql);

        assert!(sql.contains("OFFSET $2 LIMIT $3"));
        assert_eq!(stack.len(), 3);
    }
}
