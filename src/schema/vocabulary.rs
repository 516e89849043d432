//! Filter and order vocabulary shared by every generated entity.

use crate::error::AppError;
use async_graphql::dynamic::Enum;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const FILTER_OPERATION_TYPE: &str = "FilterOperation";
pub const ORDER_OPERATION_TYPE: &str = "OrderByOperation";

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PERPAGE: i64 = 50;
pub const MAX_PERPAGE: i64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperation {
    Eq,
    Neq,
    Is,
    IsNot,
    IsNull,
    IsNotNull,
    Lt,
    Gt,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
    Between,
}

impl FilterOperation {
    pub const ALL: [FilterOperation; 15] = [
        FilterOperation::Eq,
        FilterOperation::Neq,
        FilterOperation::Is,
        FilterOperation::IsNot,
        FilterOperation::IsNull,
        FilterOperation::IsNotNull,
        FilterOperation::Lt,
        FilterOperation::Gt,
        FilterOperation::Like,
        FilterOperation::NotLike,
        FilterOperation::ILike,
        FilterOperation::NotILike,
        FilterOperation::In,
        FilterOperation::NotIn,
        FilterOperation::Between,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterOperation::Eq => "EQ",
            FilterOperation::Neq => "NEQ",
            FilterOperation::Is => "IS",
            FilterOperation::IsNot => "ISNOT",
            FilterOperation::IsNull => "ISNULL",
            FilterOperation::IsNotNull => "ISNOTNULL",
            FilterOperation::Lt => "LT",
            FilterOperation::Gt => "GT",
            FilterOperation::Like => "LIKE",
            FilterOperation::NotLike => "NOTLIKE",
            FilterOperation::ILike => "ILIKE",
            FilterOperation::NotILike => "NOTILIKE",
            FilterOperation::In => "IN",
            FilterOperation::NotIn => "NOTIN",
            FilterOperation::Between => "BETWEEN",
        }
    }

    /// Operand comes from `vl` rather than `v`.
    pub fn takes_list(self) -> bool {
        matches!(self, FilterOperation::In | FilterOperation::NotIn | FilterOperation::Between)
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            FilterOperation::Like | FilterOperation::NotLike | FilterOperation::ILike | FilterOperation::NotILike
        )
    }

    pub fn enum_type() -> Enum {
        Self::ALL
            .iter()
            .fold(Enum::new(FILTER_OPERATION_TYPE), |e, op| e.item(op.name()))
            .description("Comparison applied by a filter-op input")
    }
}

impl FromStr for FilterOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| AppError::UnknownFilterOperation(s.to_string()))
    }
}

impl fmt::Display for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderOperation {
    Asc,
    Desc,
}

impl OrderOperation {
    pub fn name(self) -> &'static str {
        match self {
            OrderOperation::Asc => "ASC",
            OrderOperation::Desc => "DESC",
        }
    }

    pub fn enum_type() -> Enum {
        Enum::new(ORDER_OPERATION_TYPE)
            .item(OrderOperation::Asc.name())
            .item(OrderOperation::Desc.name())
    }
}

impl FromStr for OrderOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(OrderOperation::Asc),
            "DESC" => Ok(OrderOperation::Desc),
            other => Err(AppError::Validation(format!("unknown order direction: {}", other))),
        }
    }
}

/// One column comparison, checked for operand shape on construction.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOperation,
    pub v: Option<Value>,
    pub vl: Option<Vec<Value>>,
}

impl FilterClause {
    pub fn new(
        field: impl Into<String>,
        op: FilterOperation,
        v: Option<Value>,
        vl: Option<Vec<Value>>,
    ) -> Result<Self, AppError> {
        let field = field.into();
        let v = v.filter(|v| !v.is_null());
        match op {
            FilterOperation::In | FilterOperation::NotIn if vl.is_none() => {
                return Err(AppError::Validation(format!("{} on {} requires vl", op, field)));
            }
            FilterOperation::Between if vl.as_ref().map(Vec::len) != Some(2) => {
                return Err(AppError::Validation(format!(
                    "BETWEEN on {} requires vl with exactly 2 values",
                    field
                )));
            }
            FilterOperation::Lt | FilterOperation::Gt if v.is_none() => {
                return Err(AppError::Validation(format!("{} on {} requires v", op, field)));
            }
            _ if op.is_pattern() && v.is_none() => {
                return Err(AppError::Validation(format!("{} on {} requires v", op, field)));
            }
            _ => {}
        }
        let (v, vl) = match op {
            FilterOperation::IsNull | FilterOperation::IsNotNull => (None, None),
            _ if op.takes_list() => (None, vl),
            _ => (v, None),
        };
        Ok(FilterClause { field, op, v, vl })
    }

    /// Substring pattern for the LIKE family: `%v%`.
    pub fn like_pattern(&self) -> Option<String> {
        if !self.op.is_pattern() {
            return None;
        }
        self.v.as_ref().map(|v| format!("%{}%", value_text(v)))
    }
}

/// Text form of a scalar as used in pattern matching.
pub fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderClause {
    pub field: String,
    pub direction: OrderOperation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub perpage: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            perpage: DEFAULT_PERPAGE,
        }
    }
}

impl Pagination {
    /// Pages below 1 behave as page 1; `perpage` must be positive and is capped at `MAX_PERPAGE`.
    pub fn new(page: i64, perpage: i64) -> Result<Self, AppError> {
        if perpage <= 0 {
            return Err(AppError::Validation(format!("perpage must be positive, got {}", perpage)));
        }
        Ok(Self {
            page: page.max(1),
            perpage: perpage.min(MAX_PERPAGE),
        })
    }

    pub fn limit(&self) -> i64 {
        self.perpage
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.perpage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_limits_and_offsets() {
        let p = Pagination::default();
        assert_eq!((p.limit(), p.offset()), (50, 0));
        let p = Pagination::new(3, 10).unwrap();
        assert_eq!((p.limit(), p.offset()), (10, 20));
        let p = Pagination::new(0, 10).unwrap();
        assert_eq!((p.limit(), p.offset()), (10, 0));
        assert_eq!(Pagination::new(1, 5000).unwrap().limit(), MAX_PERPAGE);
        assert!(matches!(Pagination::new(1, 0), Err(AppError::Validation(_))));
    }

    #[test]
    fn parses_operation_names() {
        for op in FilterOperation::ALL {
            assert_eq!(op.name().parse::<FilterOperation>().unwrap(), op);
        }
        assert!(matches!("SIMILAR".parse::<FilterOperation>(), Err(AppError::UnknownFilterOperation(o)) if o == "SIMILAR"));
        assert_eq!("DESC".parse::<OrderOperation>().unwrap(), OrderOperation::Desc);
        assert!("UP".parse::<OrderOperation>().is_err());
    }

    #[test]
    fn clause_operand_rules() {
        assert!(FilterClause::new("age", FilterOperation::Between, None, Some(vec![json!(1)])).is_err());
        assert!(FilterClause::new("age", FilterOperation::In, Some(json!(1)), None).is_err());
        assert!(FilterClause::new("age", FilterOperation::Gt, Some(Value::Null), None).is_err());
        assert!(FilterClause::new("name", FilterOperation::Like, None, None).is_err());

        let c = FilterClause::new("age", FilterOperation::IsNull, Some(json!(3)), None).unwrap();
        assert_eq!(c.v, None);
        let c = FilterClause::new("age", FilterOperation::Eq, None, None).unwrap();
        assert_eq!(c.v, None);
        let c = FilterClause::new("age", FilterOperation::Between, Some(json!(9)), Some(vec![json!(1), json!(5)])).unwrap();
        assert_eq!((c.v, c.vl), (None, Some(vec![json!(1), json!(5)])));
    }

    #[test]
    fn like_wraps_value() {
        let c = FilterClause::new("name", FilterOperation::ILike, Some(json!("an")), None).unwrap();
        assert_eq!(c.like_pattern().as_deref(), Some("%an%"));
        let c = FilterClause::new("age", FilterOperation::Like, Some(json!(18)), None).unwrap();
        assert_eq!(c.like_pattern().as_deref(), Some("%18%"));
    }
}
