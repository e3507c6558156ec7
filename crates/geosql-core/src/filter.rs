//! Query predicates.
//!
//! [`Filter`] is the closed predicate tree queries are expressed with. A
//! dialect declares the kinds it can translate through
//! [`FilterCapabilities`]; [`split_filter`] separates the part of a filter
//! that can be sent to the database from the part the caller must evaluate
//! after reading.

use std::collections::BTreeSet;
use std::fmt;

use geo_types::{Polygon, Rect};

use crate::geometry::GeometryValue;
use crate::types::{Srid, Value};

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Reference to an attribute
    Property(String),
    /// Constant value
    Literal(Value),
}

impl Expression {
    /// Property reference.
    #[must_use]
    pub fn property(name: impl Into<String>) -> Self {
        Expression::Property(name.into())
    }

    /// Geometry literal.
    #[must_use]
    pub fn geometry(value: GeometryValue) -> Self {
        Expression::Literal(Value::Geometry(value))
    }

    /// Property name, if this is a property reference.
    #[must_use]
    pub fn as_property(&self) -> Option<&str> {
        match self {
            Expression::Property(name) => Some(name),
            Expression::Literal(_) => None,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    /// SQL operator.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Binary spatial operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialOp {
    /// Envelopes interact
    BBox,
    /// Farther apart than the distance
    Beyond {
        /// Distance in the units of the stored geometries
        distance: f64,
    },
    /// First contains second
    Contains,
    /// Geometries cross
    Crosses,
    /// Within the distance of each other
    DWithin {
        /// Distance in the units of the stored geometries
        distance: f64,
    },
    /// No point in common
    Disjoint,
    /// Topologically equal
    Equals,
    /// At least one point in common
    Intersects,
    /// Interiors overlap
    Overlaps,
    /// Boundaries touch
    Touches,
    /// First is within second
    Within,
}

/// A binary spatial predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFilter {
    /// The operator
    pub op: SpatialOp,
    /// First operand
    pub left: Expression,
    /// Second operand
    pub right: Expression,
}

/// Predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything
    Include,
    /// Matches nothing
    Exclude,
    /// All children match
    And(Vec<Filter>),
    /// Any child matches
    Or(Vec<Filter>),
    /// Child does not match
    Not(Box<Filter>),
    /// Binary comparison
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        left: Expression,
        /// Right operand
        right: Expression,
    },
    /// Inclusive range test
    Between {
        /// Tested expression
        expr: Expression,
        /// Lower bound
        lower: Expression,
        /// Upper bound
        upper: Expression,
    },
    /// SQL `LIKE` pattern match (`%` and `_` wildcards)
    Like {
        /// Tested expression
        expr: Expression,
        /// Pattern
        pattern: String,
    },
    /// Value is `NULL`
    IsNull(Expression),
    /// Feature identifier match (`TypeName.<key>`)
    Id(Vec<String>),
    /// Spatial predicate
    Spatial(SpatialFilter),
}

/// Kind of a filter node, used to declare capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    /// Always true
    Include,
    /// Always false
    Exclude,
    /// Conjunction
    And,
    /// Disjunction
    Or,
    /// Negation
    Not,
    /// Binary comparison
    Compare,
    /// Range test
    Between,
    /// Pattern match
    Like,
    /// Null test
    IsNull,
    /// Feature identifier match
    Id,
    /// Bounding box interaction
    BBox,
    /// Farther than a distance
    Beyond,
    /// Containment
    Contains,
    /// Crossing
    Crosses,
    /// Within a distance
    DWithin,
    /// No common point
    Disjoint,
    /// Topological equality
    Equals,
    /// Any common point
    Intersects,
    /// Interior overlap
    Overlaps,
    /// Boundary contact
    Touches,
    /// Inclusion
    Within,
}

impl FilterKind {
    /// Display name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Include => "Include",
            FilterKind::Exclude => "Exclude",
            FilterKind::And => "And",
            FilterKind::Or => "Or",
            FilterKind::Not => "Not",
            FilterKind::Compare => "Compare",
            FilterKind::Between => "Between",
            FilterKind::Like => "Like",
            FilterKind::IsNull => "IsNull",
            FilterKind::Id => "Id",
            FilterKind::BBox => "BBOX",
            FilterKind::Beyond => "Beyond",
            FilterKind::Contains => "Contains",
            FilterKind::Crosses => "Crosses",
            FilterKind::DWithin => "DWithin",
            FilterKind::Disjoint => "Disjoint",
            FilterKind::Equals => "Equals",
            FilterKind::Intersects => "Intersects",
            FilterKind::Overlaps => "Overlaps",
            FilterKind::Touches => "Touches",
            FilterKind::Within => "Within",
        }
    }

    /// Returns `true` for spatial operator kinds.
    #[must_use]
    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            FilterKind::BBox
                | FilterKind::Beyond
                | FilterKind::Contains
                | FilterKind::Crosses
                | FilterKind::DWithin
                | FilterKind::Disjoint
                | FilterKind::Equals
                | FilterKind::Intersects
                | FilterKind::Overlaps
                | FilterKind::Touches
                | FilterKind::Within
        )
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SpatialOp {
    /// Kind of the operator.
    #[must_use]
    pub fn kind(self) -> FilterKind {
        match self {
            SpatialOp::BBox => FilterKind::BBox,
            SpatialOp::Beyond { .. } => FilterKind::Beyond,
            SpatialOp::Contains => FilterKind::Contains,
            SpatialOp::Crosses => FilterKind::Crosses,
            SpatialOp::DWithin { .. } => FilterKind::DWithin,
            SpatialOp::Disjoint => FilterKind::Disjoint,
            SpatialOp::Equals => FilterKind::Equals,
            SpatialOp::Intersects => FilterKind::Intersects,
            SpatialOp::Overlaps => FilterKind::Overlaps,
            SpatialOp::Touches => FilterKind::Touches,
            SpatialOp::Within => FilterKind::Within,
        }
    }
}

impl Filter {
    /// Kind of this node.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Include => FilterKind::Include,
            Filter::Exclude => FilterKind::Exclude,
            Filter::And(_) => FilterKind::And,
            Filter::Or(_) => FilterKind::Or,
            Filter::Not(_) => FilterKind::Not,
            Filter::Compare { .. } => FilterKind::Compare,
            Filter::Between { .. } => FilterKind::Between,
            Filter::Like { .. } => FilterKind::Like,
            Filter::IsNull(_) => FilterKind::IsNull,
            Filter::Id(_) => FilterKind::Id,
            Filter::Spatial(s) => s.op.kind(),
        }
    }

    /// Spatial predicate between a property and a literal.
    #[must_use]
    pub fn spatial(op: SpatialOp, property: impl Into<String>, geometry: GeometryValue) -> Self {
        Filter::Spatial(SpatialFilter {
            op,
            left: Expression::property(property),
            right: Expression::geometry(geometry),
        })
    }

    /// Bounding box predicate; the box is sent as a polygon literal.
    #[must_use]
    pub fn bbox(property: impl Into<String>, bounds: Rect<f64>, srid: Option<Srid>) -> Self {
        let polygon: Polygon<f64> = bounds.to_polygon();
        let mut literal = GeometryValue::new(polygon);
        literal.srid = srid;
        Filter::spatial(SpatialOp::BBox, property, literal)
    }

    /// Equality comparison between a property and a literal.
    #[must_use]
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Compare {
            op: CompareOp::Eq,
            left: Expression::property(property),
            right: Expression::Literal(value.into()),
        }
    }

    /// Conjunction, flattening `Include` children.
    #[must_use]
    pub fn and(children: Vec<Filter>) -> Self {
        let mut kept: Vec<Filter> = children
            .into_iter()
            .filter(|f| !matches!(f, Filter::Include))
            .collect();
        match kept.len() {
            0 => Filter::Include,
            1 => kept.remove(0),
            _ => Filter::And(kept),
        }
    }

    /// Visit this node and all its descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Filter)) {
        visit(self);
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.walk(visit);
                }
            },
            Filter::Not(child) => child.walk(visit),
            Filter::Include
            | Filter::Exclude
            | Filter::Compare { .. }
            | Filter::Between { .. }
            | Filter::Like { .. }
            | Filter::IsNull(_)
            | Filter::Id(_)
            | Filter::Spatial(_) => {},
        }
    }
}

/// The filter kinds a dialect can translate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCapabilities {
    kinds: BTreeSet<FilterKind>,
}

impl FilterCapabilities {
    /// Capabilities covering exactly `kinds`.
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = FilterKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Logical, comparison, range, pattern, null and id filters.
    #[must_use]
    pub fn simple() -> Self {
        Self::new([
            FilterKind::Include,
            FilterKind::Exclude,
            FilterKind::And,
            FilterKind::Or,
            FilterKind::Not,
            FilterKind::Compare,
            FilterKind::Between,
            FilterKind::Like,
            FilterKind::IsNull,
            FilterKind::Id,
        ])
    }

    /// Add kinds.
    #[must_use]
    pub fn with(mut self, kinds: impl IntoIterator<Item = FilterKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    /// Whether a node kind is supported.
    #[must_use]
    pub fn supports_kind(&self, kind: FilterKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether a whole filter tree is supported.
    #[must_use]
    pub fn fully_supports(&self, filter: &Filter) -> bool {
        self.first_unsupported(filter).is_none()
    }

    /// The first unsupported node kind found in a depth-first walk.
    #[must_use]
    pub fn first_unsupported(&self, filter: &Filter) -> Option<FilterKind> {
        let mut found = None;
        filter.walk(&mut |node| {
            if found.is_none() && !self.supports_kind(node.kind()) {
                found = Some(node.kind());
            }
        });
        found
    }

    /// Supported kinds, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = FilterKind> + '_ {
        self.kinds.iter().copied()
    }
}

/// Split `filter` into `(pre, post)`: `pre` is fully supported and can be
/// sent to the database, `post` must be evaluated on the returned features.
///
/// Only conjunctions are split; any other unsupported subtree goes to `post`
/// as a whole.
#[must_use]
pub fn split_filter(capabilities: &FilterCapabilities, filter: &Filter) -> (Filter, Filter) {
    if capabilities.fully_supports(filter) {
        return (filter.clone(), Filter::Include);
    }
    match filter {
        Filter::And(children) if capabilities.supports_kind(FilterKind::And) => {
            let mut pre = Vec::new();
            let mut post = Vec::new();
            for child in children {
                let (p, q) = split_filter(capabilities, child);
                pre.push(p);
                post.push(q);
            }
            (Filter::and(pre), Filter::and(post))
        },
        _ => (Filter::Include, filter.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Point, coord};

    fn point() -> GeometryValue {
        GeometryValue::new(Point::new(1.0, 2.0))
    }

    fn caps() -> FilterCapabilities {
        FilterCapabilities::simple().with([FilterKind::Intersects, FilterKind::BBox])
    }

    #[test]
    fn test_kinds() {
        let f = Filter::spatial(SpatialOp::DWithin { distance: 5.0 }, "geom", point());
        assert_eq!(f.kind(), FilterKind::DWithin);
        assert!(f.kind().is_spatial());
        assert!(!FilterKind::Like.is_spatial());
    }

    #[test]
    fn test_first_unsupported_finds_nested() {
        let f = Filter::And(vec![
            Filter::equals("name", "A1"),
            Filter::Not(Box::new(Filter::spatial(SpatialOp::Touches, "geom", point()))),
        ]);
        assert_eq!(caps().first_unsupported(&f), Some(FilterKind::Touches));
        assert!(!caps().fully_supports(&f));
    }

    #[test]
    fn test_split_conjunction() {
        let supported = Filter::spatial(SpatialOp::Intersects, "geom", point());
        let unsupported = Filter::spatial(SpatialOp::Crosses, "geom", point());
        let f = Filter::And(vec![supported.clone(), unsupported.clone()]);

        let (pre, post) = split_filter(&caps(), &f);
        assert_eq!(pre, supported);
        assert_eq!(post, unsupported);
    }

    #[test]
    fn test_split_disjunction_is_all_or_nothing() {
        let f = Filter::Or(vec![
            Filter::equals("name", "A1"),
            Filter::spatial(SpatialOp::Touches, "geom", point()),
        ]);
        let (pre, post) = split_filter(&caps(), &f);
        assert_eq!(pre, Filter::Include);
        assert_eq!(post, f);
    }

    #[test]
    fn test_bbox_builds_polygon_literal() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 });
        let Filter::Spatial(spatial) = Filter::bbox("geom", rect, Some(4326)) else {
            panic!("expected spatial filter")
        };
        assert_eq!(spatial.op, SpatialOp::BBox);
        let Expression::Literal(Value::Geometry(literal)) = spatial.right else {
            panic!("expected geometry literal")
        };
        assert_eq!(literal.srid, Some(4326));
    }

    #[test]
    fn test_and_flattens_include() {
        assert_eq!(Filter::and(vec![Filter::Include, Filter::Include]), Filter::Include);
        let f = Filter::equals("a", 1_i64);
        assert_eq!(Filter::and(vec![Filter::Include, f.clone()]), f);
    }
}
