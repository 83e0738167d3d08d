//! Compiles validated document filters into bound JSONB predicates.
//!
//! Every field name and every operand is passed as a bind parameter; the
//! only SQL text produced here comes from the fixed operator table below.
//! Semantics match [`Filter::matches`](crate::domain::Filter::matches), which
//! the in-memory adapter uses.

use diesel::dsl::sql;
use diesel::expression::BoxableExpression;
use diesel::pg::Pg;
use diesel::sql_types::{Array, Bool, Double, Text};

use crate::domain::{Filter, FilterOp, escape_like, scalar_text};

use super::schema::documents;

/// Boxed boolean expression over the `documents` table.
pub(crate) type DocumentPredicate = Box<dyn BoxableExpression<documents::table, Pg, SqlType = Bool>>;

fn field_name(filter: &Filter) -> String {
    filter.field().as_ref().to_owned()
}

fn numeric_comparator(op: FilterOp) -> Option<&'static str> {
    match op {
        FilterOp::Gt => Some(" > "),
        FilterOp::Lt => Some(" < "),
        FilterOp::Gte => Some(" >= "),
        FilterOp::Lte => Some(" <= "),
        _ => None,
    }
}

fn always_false() -> DocumentPredicate {
    Box::new(sql::<Bool>("FALSE"))
}

fn null_check(filter: &Filter, comparator: &'static str) -> DocumentPredicate {
    Box::new(
        sql::<Bool>("COALESCE(jsonb_typeof(documents.data -> ")
            .bind::<Text, _>(field_name(filter))
            .sql("), 'null')")
            .sql(comparator)
            .sql("'null'"),
    )
}

fn text_comparison(filter: &Filter, comparator: &'static str, operand: String) -> DocumentPredicate {
    Box::new(
        sql::<Bool>("(documents.data ->> ")
            .bind::<Text, _>(field_name(filter))
            .sql(")")
            .sql(comparator)
            .bind::<Text, _>(operand),
    )
}

fn numeric_comparison(filter: &Filter, comparator: &'static str) -> DocumentPredicate {
    let Some(operand) = filter.numeric_operand() else {
        return always_false();
    };
    Box::new(
        sql::<Bool>("(CASE WHEN jsonb_typeof(documents.data -> ")
            .bind::<Text, _>(field_name(filter))
            .sql(") = 'number' THEN (documents.data ->> ")
            .bind::<Text, _>(field_name(filter))
            .sql(")::float8 END)")
            .sql(comparator)
            .bind::<Double, _>(operand),
    )
}

/// Translate one filter into a predicate.
pub(crate) fn filter_predicate(filter: &Filter) -> DocumentPredicate {
    let op = filter.op();
    if let Some(comparator) = numeric_comparator(op) {
        return numeric_comparison(filter, comparator);
    }
    match op {
        FilterOp::Eq if filter.value().is_null() => null_check(filter, " = "),
        FilterOp::Ne if filter.value().is_null() => null_check(filter, " <> "),
        FilterOp::Eq => text_comparison(filter, " = ", scalar_text(filter.value())),
        FilterOp::Ne => text_comparison(filter, " <> ", scalar_text(filter.value())),
        FilterOp::In => Box::new(
            sql::<Bool>("(documents.data ->> ")
                .bind::<Text, _>(field_name(filter))
                .sql(") = ANY(")
                .bind::<Array<Text>, _>(filter.in_candidates())
                .sql(")"),
        ),
        FilterOp::Contains => text_comparison(
            filter,
            " ILIKE ",
            format!("%{}%", escape_like(&scalar_text(filter.value()))),
        ),
        FilterOp::StartsWith => text_comparison(
            filter,
            " ILIKE ",
            format!("{}%", escape_like(&scalar_text(filter.value()))),
        ),
        FilterOp::Gt | FilterOp::Lt | FilterOp::Gte | FilterOp::Lte => always_false(),
    }
}

/// Case-insensitive substring match over the whole serialised payload.
pub(crate) fn search_predicate(needle: &str) -> DocumentPredicate {
    Box::new(
        sql::<Bool>("documents.data::text ILIKE ")
            .bind::<Text, _>(format!("%{}%", escape_like(needle))),
    )
}
