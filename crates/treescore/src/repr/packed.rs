//! Packed nested-array form of a tree.
//!
//! Each node becomes a JSON array laid out by its variant's
//! [`OffsetTable`](super::OffsetTable). Reading a packed tree with the table
//! of another variant fails on the first record that does not fit.

use serde_json::{json, Value as Json};

use super::compact::{CompactTree, LayoutError};
use super::layout::{OffsetTable, TreeVariant};
use super::node::{
    BoostingStats, ClassificationStats, DistributionUnit, Node, NodeStats, RegressionStats,
    WeightedStats,
};
use super::predicate::{Operator, Predicate, PredicateValue};
use super::value::Value;
use super::NodeId;

impl CompactTree {
    /// Pack the tree into nested arrays using its variant's offset table.
    pub fn to_packed(&self) -> Json {
        self.pack_node(self.root())
    }

    fn pack_node(&self, node: NodeId) -> Json {
        let table = self.variant().offsets();
        let n = self.node(node);
        let is_leaf = n.is_leaf();
        let mut record = vec![Json::Null; table.record_len(is_leaf)];

        record[table.predicate] = match n.predicate() {
            None => Json::Bool(true),
            Some(p) => pack_predicate(p),
        };
        record[table.id] = json!(n.id());
        record[table.children_count] = json!(n.n_children());

        match n.stats() {
            NodeStats::Classification(s) => pack_classification(&mut record, table, s),
            NodeStats::WeightedClassification(s, w) => {
                pack_classification(&mut record, table, s);
                pack_weighted(&mut record, table, w);
            }
            NodeStats::Regression(s) => pack_regression(&mut record, table, s),
            NodeStats::WeightedRegression(s, w) => {
                pack_regression(&mut record, table, s);
                pack_weighted(&mut record, table, w);
            }
            NodeStats::Boosting(s) => {
                record[table.output] = json!(s.output);
                record[table.count] = json!(s.count);
                set(&mut record, table.g_sum, json!(s.g_sum));
                set(&mut record, table.h_sum, json!(s.h_sum));
            }
        }

        if !is_leaf {
            record[table.children] =
                Json::Array(self.child_ids(node).map(|c| self.pack_node(c)).collect());
        }
        Json::Array(record)
    }

    /// Read a packed tree with the offset table of `variant`.
    pub fn from_packed(packed: &Json, variant: TreeVariant) -> Result<Self, LayoutError> {
        let root = unpack_node(packed, variant.offsets())?;
        Self::build(&root, variant)
    }
}

fn set(record: &mut [Json], position: Option<usize>, value: Json) {
    if let Some(p) = position {
        record[p] = value;
    }
}

fn pack_predicate(p: &Predicate) -> Json {
    let value = match p.value() {
        PredicateValue::Null => Json::Null,
        PredicateValue::Number(n) => json!(n),
        PredicateValue::Text(s) => json!(s),
        PredicateValue::Set(values) => Json::Array(values.iter().map(pack_value).collect()),
    };
    json!([p.operator().code(), p.field(), value, p.term(), p.missing()])
}

fn pack_value(v: &Value) -> Json {
    match v {
        Value::Number(n) => json!(n),
        Value::Text(s) => json!(s),
    }
}

fn pack_classification(record: &mut [Json], table: &OffsetTable, s: &ClassificationStats) {
    record[table.output] = json!(s.output);
    record[table.count] = json!(s.count);
    set(record, table.confidence, json!(s.confidence));
    set(record, table.distribution, json!(s.distribution));
}

fn pack_regression(record: &mut [Json], table: &OffsetTable, s: &RegressionStats) {
    record[table.output] = json!(s.output);
    record[table.count] = json!(s.count);
    set(record, table.confidence, json!(s.confidence));
    set(record, table.distribution, json!(s.distribution));
    set(record, table.distribution_unit, json!(s.distribution_unit.as_str()));
    set(record, table.bin_count, json!(s.distribution.len()));
    set(record, table.max, json!(s.max));
    set(record, table.min, json!(s.min));
    set(record, table.median, json!(s.median));
}

fn pack_weighted<K: serde::Serialize>(record: &mut [Json], table: &OffsetTable, w: &WeightedStats<K>) {
    set(record, table.weighted_distribution, json!(w.distribution));
    set(record, table.weight, json!(w.weight));
}

// =============================================================================
// Unpacking
// =============================================================================

struct Reader<'a> {
    record: &'a [Json],
    table: &'a OffsetTable,
}

impl<'a> Reader<'a> {
    fn malformed(&self, position: usize, reason: impl Into<String>) -> LayoutError {
        LayoutError::MalformedRecord {
            variant: self.table.variant,
            position,
            reason: reason.into(),
        }
    }

    fn required(&self, position: Option<usize>) -> Result<usize, LayoutError> {
        position.ok_or_else(|| self.malformed(0, "attribute not in layout"))
    }

    fn f64_at(&self, position: usize) -> Result<f64, LayoutError> {
        self.record[position]
            .as_f64()
            .ok_or_else(|| self.malformed(position, "expected a number"))
    }

    fn opt_f64_at(&self, position: Option<usize>) -> Result<Option<f64>, LayoutError> {
        let position = self.required(position)?;
        match &self.record[position] {
            Json::Null => Ok(None),
            v => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.malformed(position, "expected a number or null")),
        }
    }

    fn string_at(&self, position: usize) -> Result<String, LayoutError> {
        self.record[position]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.malformed(position, "expected a string"))
    }

    fn pairs_at<K>(
        &self,
        position: Option<usize>,
        key: impl Fn(&Json) -> Option<K>,
    ) -> Result<Vec<(K, f64)>, LayoutError> {
        let position = self.required(position)?;
        let items = self.record[position]
            .as_array()
            .ok_or_else(|| self.malformed(position, "expected a distribution array"))?;
        items
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([k, count]) => match (key(k), count.as_f64()) {
                    (Some(k), Some(c)) => Ok((k, c)),
                    _ => Err(self.malformed(position, "bad distribution entry")),
                },
                _ => Err(self.malformed(position, "distribution entries are pairs")),
            })
            .collect()
    }

    fn categories_at(&self, position: Option<usize>) -> Result<Vec<(String, f64)>, LayoutError> {
        self.pairs_at(position, |k| k.as_str().map(str::to_string))
    }

    fn bins_at(&self, position: Option<usize>) -> Result<Vec<(f64, f64)>, LayoutError> {
        self.pairs_at(position, Json::as_f64)
    }

    fn classification(&self) -> Result<ClassificationStats, LayoutError> {
        Ok(ClassificationStats {
            output: self.string_at(self.table.output)?,
            count: self.f64_at(self.table.count)?,
            confidence: self.opt_f64_at(self.table.confidence)?,
            distribution: self.categories_at(self.table.distribution)?,
        })
    }

    fn regression(&self) -> Result<RegressionStats, LayoutError> {
        let unit_position = self.required(self.table.distribution_unit)?;
        let distribution_unit = self.record[unit_position]
            .as_str()
            .and_then(DistributionUnit::parse)
            .ok_or_else(|| self.malformed(unit_position, "unknown distribution unit"))?;

        Ok(RegressionStats {
            output: self.f64_at(self.table.output)?,
            count: self.f64_at(self.table.count)?,
            confidence: self.opt_f64_at(self.table.confidence)?,
            distribution: self.bins_at(self.table.distribution)?,
            distribution_unit,
            max: self.opt_f64_at(self.table.max)?,
            min: self.opt_f64_at(self.table.min)?,
            median: self.opt_f64_at(self.table.median)?,
        })
    }

    fn weight(&self) -> Result<f64, LayoutError> {
        let position = self.required(self.table.weight)?;
        self.f64_at(position)
    }

    fn stats(&self) -> Result<NodeStats, LayoutError> {
        Ok(match self.table.variant {
            TreeVariant::Classification => NodeStats::Classification(self.classification()?),
            TreeVariant::WeightedClassification => NodeStats::WeightedClassification(
                self.classification()?,
                WeightedStats {
                    distribution: self.categories_at(self.table.weighted_distribution)?,
                    weight: self.weight()?,
                },
            ),
            TreeVariant::Regression => NodeStats::Regression(self.regression()?),
            TreeVariant::WeightedRegression => NodeStats::WeightedRegression(
                self.regression()?,
                WeightedStats {
                    distribution: self.bins_at(self.table.weighted_distribution)?,
                    weight: self.weight()?,
                },
            ),
            TreeVariant::Boosting => NodeStats::Boosting(BoostingStats {
                output: self.f64_at(self.table.output)?,
                count: self.f64_at(self.table.count)?,
                g_sum: self.f64_at(self.required(self.table.g_sum)?)?,
                h_sum: self.f64_at(self.required(self.table.h_sum)?)?,
            }),
        })
    }
}

fn unpack_node(packed: &Json, table: &OffsetTable) -> Result<Node, LayoutError> {
    let record = packed.as_array().ok_or_else(|| LayoutError::MalformedRecord {
        variant: table.variant,
        position: 0,
        reason: "node record is not an array".into(),
    })?;

    let leaf_len = table.record_len(true);
    let inner_len = table.record_len(false);
    if record.len() != leaf_len && record.len() != inner_len {
        return Err(LayoutError::RecordLength {
            variant: table.variant,
            expected: leaf_len,
            actual: record.len(),
        });
    }

    let reader = Reader { record, table };
    let id = record[table.id]
        .as_u64()
        .ok_or_else(|| reader.malformed(table.id, "expected a node id"))? as u32;
    let predicate = unpack_predicate(&record[table.predicate])?;
    let stats = reader.stats()?;

    let n_children = record[table.children_count]
        .as_u64()
        .ok_or_else(|| reader.malformed(table.children_count, "expected a child count"))?
        as usize;
    let children = match record.get(table.children) {
        None if n_children == 0 => Vec::new(),
        None => return Err(reader.malformed(table.children_count, "children list is absent")),
        Some(list) => {
            let list = list
                .as_array()
                .ok_or_else(|| reader.malformed(table.children, "expected a children list"))?;
            if list.len() != n_children {
                return Err(reader.malformed(table.children_count, "child count mismatch"));
            }
            list.iter()
                .map(|child| unpack_node(child, table))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Node {
        id,
        predicate,
        stats,
        children,
    })
}

fn unpack_predicate(header: &Json) -> Result<Option<Predicate>, LayoutError> {
    let malformed = |reason: &str| LayoutError::MalformedPredicate(reason.to_string());

    match header {
        Json::Bool(true) => Ok(None),
        Json::Array(parts) => {
            let [op, field, value, term, missing] = parts.as_slice() else {
                return Err(malformed("expected [op, field, value, term, missing]"));
            };
            let operator = op
                .as_u64()
                .and_then(|c| u8::try_from(c).ok())
                .and_then(Operator::from_code)
                .ok_or_else(|| malformed("unknown opcode"))?;
            let field = field.as_str().ok_or_else(|| malformed("field id is not a string"))?;
            let value = unpack_predicate_value(value).ok_or_else(|| malformed("bad value"))?;

            let mut predicate = Predicate::new(operator, field, value)
                .with_missing(missing.as_bool().unwrap_or(false));
            if let Some(term) = term.as_str() {
                predicate = predicate.with_term(term);
            }
            Ok(Some(predicate))
        }
        _ => Err(malformed("expected an array or `true`")),
    }
}

/// Convert a JSON operand into a predicate value.
pub(crate) fn unpack_predicate_value(value: &Json) -> Option<PredicateValue> {
    Some(match value {
        Json::Null => PredicateValue::Null,
        Json::Number(n) => PredicateValue::Number(n.as_f64()?),
        Json::String(s) => PredicateValue::Text(s.clone()),
        Json::Array(items) => PredicateValue::Set(
            items
                .iter()
                .map(|item| match item {
                    Json::Number(n) => n.as_f64().map(Value::Number),
                    Json::String(s) => Some(Value::Text(s.clone())),
                    _ => None,
                })
                .collect::<Option<_>>()?,
        ),
        Json::Bool(_) | Json::Object(_) => return None,
    })
}
