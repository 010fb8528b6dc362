//! Conversion from schema types to runtime types.
//!
//! Conversions are `TryFrom` impls: the export is validated while it is
//! converted, and the first problem found is reported as a [`ReadError`].

use crate::model::{BoostingInfo, Ensemble, TreeModel};
use crate::repr::{
    unpack_predicate_value, BoostingStats, ClassificationStats, CompactTree, DistributionUnit,
    FieldDescriptor, FieldSummary, Fields, Node, NodeStats, Operator, Optype, Predicate,
    RegressionStats, TreeVariant, WeightedStats,
};

use super::error::ReadError;
use super::schema::{
    EnsembleSchema, FieldSchema, FieldSummarySchema, ModelSchema, NodeSchema,
    ObjectiveSummarySchema, PredicateSchema,
};

// =============================================================================
// Fields
// =============================================================================

impl From<FieldSummarySchema> for FieldSummary {
    fn from(schema: FieldSummarySchema) -> Self {
        Self {
            mean: schema.mean,
            stdev: schema.standard_deviation,
            missing_count: schema.missing_count,
            categories: schema.categories,
            term_forms: schema.term_forms,
            tag_cloud: schema.tag_cloud,
            items: schema.items,
        }
    }
}

fn field_from_schema(id: String, schema: FieldSchema) -> FieldDescriptor {
    let name = schema.name.unwrap_or_else(|| id.clone());
    FieldDescriptor {
        summary: schema.summary.into(),
        term_analysis: schema.term_analysis,
        item_analysis: schema.item_analysis,
        ..FieldDescriptor::new(id, name, schema.optype)
    }
}

// =============================================================================
// Nodes
// =============================================================================

fn predicate_from_schema(schema: PredicateSchema, node: u32) -> Result<Option<Predicate>, ReadError> {
    let split = match schema {
        PredicateSchema::Unconditional(true) => return Ok(None),
        PredicateSchema::Unconditional(false) => {
            return Err(ReadError::Validation(format!(
                "node {node}: `false` is not a predicate"
            )))
        }
        PredicateSchema::Split(split) => split,
    };

    let (symbol, starred) = match split.operator.strip_suffix('*') {
        Some(symbol) => (symbol, true),
        None => (split.operator.as_str(), false),
    };
    let operator = Operator::from_symbol(symbol).ok_or_else(|| {
        ReadError::Validation(format!("node {node}: unknown operator `{}`", split.operator))
    })?;
    let value = unpack_predicate_value(&split.value).ok_or_else(|| {
        ReadError::Validation(format!("node {node}: unsupported predicate value {}", split.value))
    })?;

    let predicate = Predicate::new(operator, split.field, value).with_missing(split.missing || starred);
    Ok(Some(match split.term {
        Some(term) => predicate.with_term(term),
        None => predicate,
    }))
}

/// Regression bins of a summary and whether they are exact counts.
fn summary_bins(summary: &ObjectiveSummarySchema) -> (Vec<(f64, f64)>, DistributionUnit) {
    match (&summary.bins, &summary.counts) {
        (Some(bins), _) => (bins.clone(), DistributionUnit::Bins),
        (None, Some(counts)) => (counts.clone(), DistributionUnit::Counts),
        (None, None) => (Vec::new(), DistributionUnit::Counts),
    }
}

fn stats_from_schema(node: &NodeSchema, variant: TreeVariant) -> Result<NodeStats, ReadError> {
    let invalid = |what: &str| ReadError::Validation(format!("node {}: {what}", node.id));
    let number_output = || node.output.as_f64().ok_or_else(|| invalid("output is not a number"));
    let summary = &node.objective_summary;

    let classification = || -> Result<ClassificationStats, ReadError> {
        let output = node
            .output
            .as_str()
            .ok_or_else(|| invalid("output is not a category"))?;
        Ok(ClassificationStats {
            output: output.to_string(),
            count: node.count,
            confidence: node.confidence,
            distribution: summary.categories.clone().unwrap_or_default(),
        })
    };
    let regression = || -> Result<RegressionStats, ReadError> {
        let (distribution, distribution_unit) = summary_bins(summary);
        Ok(RegressionStats {
            output: number_output()?,
            count: node.count,
            confidence: node.confidence,
            distribution,
            distribution_unit,
            max: summary.maximum,
            min: summary.minimum,
            median: summary.median,
        })
    };
    let weighted = || -> Result<(&ObjectiveSummarySchema, f64), ReadError> {
        let summary = node
            .weighted_objective_summary
            .as_ref()
            .ok_or_else(|| invalid("weighted tree node has no weighted_objective_summary"))?;
        let weight = node.weight.ok_or_else(|| invalid("weighted tree node has no weight"))?;
        Ok((summary, weight))
    };

    Ok(match variant {
        TreeVariant::Classification => NodeStats::Classification(classification()?),
        TreeVariant::WeightedClassification => {
            let (w, weight) = weighted()?;
            NodeStats::WeightedClassification(
                classification()?,
                WeightedStats {
                    distribution: w.categories.clone().unwrap_or_default(),
                    weight,
                },
            )
        }
        TreeVariant::Regression => NodeStats::Regression(regression()?),
        TreeVariant::WeightedRegression => {
            let (w, weight) = weighted()?;
            NodeStats::WeightedRegression(
                regression()?,
                WeightedStats {
                    distribution: summary_bins(w).0,
                    weight,
                },
            )
        }
        TreeVariant::Boosting => NodeStats::Boosting(BoostingStats {
            output: number_output()?,
            count: node.count,
            g_sum: node.g_sum.ok_or_else(|| invalid("boosted node has no g_sum"))?,
            h_sum: node.h_sum.ok_or_else(|| invalid("boosted node has no h_sum"))?,
        }),
    })
}

fn node_from_schema(schema: NodeSchema, variant: TreeVariant) -> Result<Node, ReadError> {
    let stats = stats_from_schema(&schema, variant)?;
    let predicate = predicate_from_schema(schema.predicate, schema.id)?;
    let children = schema
        .children
        .into_iter()
        .map(|child| node_from_schema(child, variant))
        .collect::<Result<_, _>>()?;

    Ok(Node {
        id: schema.id,
        predicate,
        stats,
        children,
    })
}

// =============================================================================
// Models
// =============================================================================

impl TryFrom<ModelSchema> for TreeModel {
    type Error = ReadError;

    fn try_from(schema: ModelSchema) -> Result<Self, Self::Error> {
        let ModelSchema {
            objective_field,
            boosting,
            model,
        } = schema;

        let fields: Fields = model
            .fields
            .into_iter()
            .map(|(id, field)| field_from_schema(id, field))
            .collect();
        let regression = match fields.get(&objective_field) {
            Some(field) => field.optype == Optype::Numeric,
            None => model.root.output.is_number(),
        };
        let weighted = model.root.weighted_objective_summary.is_some();
        let variant = TreeVariant::select(regression, weighted, boosting.is_some());

        let root = node_from_schema(model.root, variant)?;
        let tree = CompactTree::build(&root, variant)?;
        tree.validate().map_err(ReadError::Structure)?;

        let model = TreeModel::new(tree, fields, objective_field);
        Ok(match boosting {
            Some(b) => model.with_boosting(BoostingInfo {
                lambda: b.lambda,
                weight: b.weight,
                objective_class: b.objective_class,
            }),
            None => model,
        })
    }
}

impl TryFrom<EnsembleSchema> for Ensemble {
    type Error = ReadError;

    fn try_from(schema: EnsembleSchema) -> Result<Self, Self::Error> {
        let models = schema
            .models
            .into_iter()
            .map(TreeModel::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ensemble = Ensemble::from_models(models).map_err(|e| ReadError::Validation(e.to_string()))?;
        Ok(match schema.initial_offset {
            Some(offset) => ensemble.with_offset(offset),
            None => ensemble,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{PredicateValue, TreeValidationError};
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<TreeModel, ReadError> {
        let schema: ModelSchema = serde_json::from_value(value).unwrap();
        TreeModel::try_from(schema)
    }

    fn regression_export() -> serde_json::Value {
        json!({
            "objective_field": "y",
            "model": {
                "fields": {
                    "x": {"name": "width", "optype": "numeric"},
                    "y": {"optype": "numeric"}
                },
                "root": {
                    "id": 0, "predicate": true, "output": 2.0, "count": 3,
                    "objective_summary": {"counts": [[1, 1], [2, 1], [3, 1]], "minimum": 1, "maximum": 3},
                    "children": [
                        {"id": 1, "predicate": {"operator": "<=*", "field": "x", "value": 0.5},
                         "output": 1.0, "count": 1,
                         "objective_summary": {"counts": [[1, 1]]}},
                        {"id": 2, "predicate": {"operator": ">", "field": "x", "value": 0.5, "missing": null},
                         "output": 2.5, "count": 2,
                         "objective_summary": {"bins": [[2, 1], [3, 1]]}}
                    ]
                }
            }
        })
    }

    #[test]
    fn reads_regression_tree() {
        let model = parse(regression_export()).unwrap();
        assert_eq!(model.variant(), TreeVariant::Regression);
        assert_eq!(model.fields().name("x"), "width");
        assert_eq!(model.fields().name("y"), "y");

        let tree = model.tree();
        let left = tree.node(1).predicate().unwrap();
        assert_eq!(left.operator(), Operator::Le);
        assert!(left.missing());
        assert_eq!(left.value(), &PredicateValue::Number(0.5));
        assert!(!tree.node(2).predicate().unwrap().missing());

        match tree.node(2).stats() {
            NodeStats::Regression(s) => assert_eq!(s.distribution_unit, DistributionUnit::Bins),
            other => panic!("unexpected stats {other:?}"),
        }
    }

    #[test]
    fn rejects_category_output_in_regression() {
        let mut export = regression_export();
        export["model"]["root"]["children"][0]["output"] = json!("low");
        let err = parse(export).unwrap_err();
        assert!(matches!(err, ReadError::Validation(msg) if msg.starts_with("node 1")));
    }

    #[test]
    fn rejects_unknown_operator() {
        let mut export = regression_export();
        export["model"]["root"]["children"][1]["predicate"]["operator"] = json!("~");
        assert!(matches!(parse(export), Err(ReadError::Validation(_))));
    }

    #[test]
    fn rejects_conditional_root() {
        let mut export = regression_export();
        export["model"]["root"]["predicate"] = json!({"operator": ">", "field": "x", "value": 1});
        assert!(matches!(
            parse(export),
            Err(ReadError::Structure(TreeValidationError::ConditionalRoot))
        ));
    }

    #[test]
    fn weighted_summaries_select_weighted_variant() {
        let mut export = regression_export();
        let root = &mut export["model"]["root"];
        root["weighted_objective_summary"] = json!({"counts": [[1, 2], [2, 1], [3, 1]]});
        root["weight"] = json!(4.0);
        for (child, weighted) in [(0, json!([[1, 2]])), (1, json!([[2, 1], [3, 1]]))] {
            let weight = weighted.as_array().unwrap().len() as f64;
            root["children"][child]["weighted_objective_summary"] = json!({"counts": weighted});
            root["children"][child]["weight"] = json!(weight);
        }

        let model = parse(export.clone()).unwrap();
        assert_eq!(model.variant(), TreeVariant::WeightedRegression);
        match model.tree().node(1).stats() {
            NodeStats::WeightedRegression(s, w) => {
                assert_eq!(s.distribution, vec![(1.0, 1.0)]);
                assert_eq!(w.distribution, vec![(1.0, 2.0)]);
                assert_eq!(w.weight, 1.0);
            }
            other => panic!("unexpected stats {other:?}"),
        }

        export["model"]["root"]["children"][1]
            .as_object_mut()
            .unwrap()
            .remove("weight");
        let err = parse(export).unwrap_err();
        assert!(matches!(err, ReadError::Validation(msg) if msg == "node 2: weighted tree node has no weight"));
    }

    #[test]
    fn boosting_metadata_selects_boosting_variant() {
        let export = json!({
            "objective_field": "y",
            "boosting": {"weight": 0.1, "objective_class": "yes"},
            "model": {
                "fields": {"y": {"optype": "categorical"}},
                "root": {"id": 0, "predicate": true, "output": 0.3, "count": 4, "g_sum": -1.2, "h_sum": 3.0}
            }
        });
        let model = parse(export).unwrap();
        assert_eq!(model.variant(), TreeVariant::Boosting);
        let boosting = model.boosting().unwrap();
        assert_eq!(boosting.lambda, 1.0);
        assert_eq!(boosting.objective_class.as_deref(), Some("yes"));
    }
}
