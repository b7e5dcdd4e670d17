// Hard assignment of documents to their dominant topic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::labeler::TopicLabel;
use super::model::TopicModel;

/// One document's dominant topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Document row in the model
    pub document: usize,
    pub topic: usize,
    pub probability: f64,
}

/// Documents sharing a main label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelGroup {
    pub label: String,
    /// Topic ids carrying this label, ascending
    pub topics: Vec<usize>,
    /// Descending probability, ascending document row on ties
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TopicAssigner;

impl TopicAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Argmax over each Theta row; ties go to the lowest topic id.
    pub fn assign(&self, model: &TopicModel) -> Vec<Assignment> {
        model
            .doc_topic()
            .outer_iter()
            .enumerate()
            .map(|(document, row)| {
                let (topic, probability) = row.iter().copied().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |best, (t, p)| if p > best.1 { (t, p) } else { best },
                );
                Assignment {
                    document,
                    topic,
                    probability,
                }
            })
            .collect()
    }

    /// Group assignments by the label of their topic. Groups appear in order
    /// of their smallest topic id. Topics that share a label share a group.
    pub fn group_by_label(
        &self,
        assignments: &[Assignment],
        labels: &[TopicLabel],
    ) -> Vec<LabelGroup> {
        let mut group_of: BTreeMap<usize, usize> = BTreeMap::new();
        let mut groups: Vec<LabelGroup> = Vec::new();
        let mut sorted_labels: Vec<&TopicLabel> = labels.iter().collect();
        sorted_labels.sort_by_key(|l| l.topic);

        for label in sorted_labels {
            match groups.iter().position(|g| g.label == label.label) {
                Some(i) => {
                    groups[i].topics.push(label.topic);
                    group_of.insert(label.topic, i);
                }
                None => {
                    group_of.insert(label.topic, groups.len());
                    groups.push(LabelGroup {
                        label: label.label.clone(),
                        topics: vec![label.topic],
                        assignments: Vec::new(),
                    });
                }
            }
        }

        for assignment in assignments {
            if let Some(&i) = group_of.get(&assignment.topic) {
                groups[i].assignments.push(*assignment);
            }
        }
        for group in &mut groups {
            group.assignments.sort_by(|a, b| {
                b.probability
                    .total_cmp(&a.probability)
                    .then(a.document.cmp(&b.document))
            });
        }
        groups
    }
}
