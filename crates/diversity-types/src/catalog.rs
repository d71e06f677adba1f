//! Built-in datasets served by `GET /defaults/{id}`

use serde::{Deserialize, Serialize};

/// Nature-themed sentences bundled for offline exploration
pub const EXAMPLE_CORPUS: &str = include_str!("../data/example_corpus.txt");

/// File name used when the bundled corpus is loaded
pub const EXAMPLE_CORPUS_NAME: &str = "default_examples.txt";

/// Response of `GET /defaults/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetContent {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub file: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatasetKind {
    /// The category itself is a dataset
    Single { file: &'static str },
    Collection { datasets: &'static [Dataset] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub citation: Option<&'static str>,
    pub kind: DatasetKind,
}

const fn ds(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    file: &'static str,
) -> Dataset {
    Dataset {
        id,
        name,
        description,
        file,
    }
}

const NEWS_SUMMARIES: &[Dataset] = &[
    ds("cnn_flant5", "CNN/DailyMail (FlanT5)", "", "cnn_flant5.txt"),
    ds("cnn_llama2", "CNN/DailyMail (Llama-2)", "", "cnn_llama-2.txt"),
    ds("cnn_gpt4", "CNN/DailyMail (GPT-4)", "", "cnn_GPT-4.txt"),
    ds("cnn_mistral", "CNN/DailyMail (Mistral)", "", "cnn_mistral.txt"),
    ds("cnn_gold", "CNN/DailyMail (Human-written Summary)", "", "cnn_gold.txt"),
    ds("cnn_stablelm", "CNN/DailyMail (StableLM)", "", "cnn_stablelm.txt"),
    ds("xsum_flant5", "XSUM (FlanT5)", "", "xsum_flant5.txt"),
    ds("xsum_llama2", "XSUM (Llama-2)", "", "xsum_llama-2.txt"),
    ds("xsum_gpt4", "XSUM (GPT-4)", "", "xsum_GPT-4.txt"),
    ds("xsum_mistral", "XSUM (Mistral)", "", "xsum_mistral.txt"),
    ds("xsum_gold", "XSUM (Human-written Summary)", "", "xsum_gold.txt"),
    ds("xsum_stablelm", "XSUM (StableLM)", "", "xsum_stablelm.txt"),
    ds("xsum_stablebeluga", "XSUM (StableBeluga)", "", "xsum_stablebeluga.txt"),
];

const ESSAYS: &[Dataset] = &[
    ds("essays_gpt3", "GPT-3 Essays", "Essays co-written with GPT-3", "essays_gpt3.txt"),
    ds("essays_solo", "Solo Essays", "Essays written only by humans.", "essays_solo.txt"),
    ds(
        "essays_instructgpt",
        "InstructGPT Essays",
        "Essays co-written with InstructGPT",
        "essays_instructgpt.txt",
    ),
];

const SYNTHETIC: &[Dataset] = &[
    ds("summary_1", "Summaries (iteration 1)", "XLSum summaries after 1 iteration of recursive training.", "summary_1.txt"),
    ds("summary_3", "Summaries (iteration 3)", "XLSum summaries after 3 iterations of recursive training.", "summary_3.txt"),
    ds("summary_5", "Summaries (iteration 5)", "XLSum summaries after 5 iterations of recursive training.", "summary_5.txt"),
    ds("summary_human", "Summaries (reference)", "Human reference XLSum summaries.", "summary_human.txt"),
    ds("abstract_1", "Scientific abstracts (iteration 1)", "Scientific abstract generation (ACL Anthology) after 1 iteration of recursive training.", "abstract_1.txt"),
    ds("abstract_3", "Scientific abstracts (iteration 3)", "Scientific abstract generation (ACL Anthology) after 3 iterations of recursive training.", "abstract_3.txt"),
    ds("abstract_5", "Scientific abstracts (iteration 5)", "Scientific abstract generation (ACL Anthology) after 5 iterations of recursive training.", "abstract_5.txt"),
    ds("abstract_human", "Scientific abstracts (reference)", "ACL Anthology reference abstracts.", "abstract_human.txt"),
    ds("story_1", "Stories (iteration 1)", "WritingPrompts (creative story generation) after 1 iteration of recursive training.", "story_1.txt"),
    ds("story_3", "Stories (iteration 3)", "WritingPrompts (creative story generation) after 3 iterations of recursive training.", "story_3.txt"),
    ds("story_5", "Stories (iteration 5)", "WritingPrompts (creative story generation) after 5 iterations of recursive training.", "story_5.txt"),
    ds("story_human", "Stories (reference)", "Human reference from the WritingPrompts data.", "story_human.txt"),
];

/// All dataset categories in display order
pub const CATEGORIES: &[DatasetCategory] = &[
    DatasetCategory {
        id: "nature",
        name: "Toy Dataset",
        description: "A set of nature-themed sentences to explore templates. (Tip: Loads the fastest!)",
        citation: None,
        kind: DatasetKind::Single {
            file: "nature_examples.txt",
        },
    },
    DatasetCategory {
        id: "paper",
        name: "Generated News Summaries (Shaib et. al, 2024)",
        description: "News summaries collected from \"Standardizing the Measurement of Text Diversity\"",
        citation: Some("Shaib, C., Barrow, J., Sun, J., Siu, A. F., Wallace, B. C., & Nenkova, A. (2024). Standardizing the measurement of text diversity: A tool and a comparative analysis of scores. arXiv preprint arXiv:2403.00553."),
        kind: DatasetKind::Collection {
            datasets: NEWS_SUMMARIES,
        },
    },
    DatasetCategory {
        id: "essays",
        name: "Argumentative Essays (Padmakumar et. al, 2023)",
        description: "Essays collected from \"Does Writing With Language Models Reduce Content Diversity?\"",
        citation: Some("Padmakumar, V., & He, H. (2023). Does Writing with Language Models Reduce Content Diversity?. arXiv preprint arXiv:2309.05196."),
        kind: DatasetKind::Collection { datasets: ESSAYS },
    },
    DatasetCategory {
        id: "synthetic",
        name: "Synthetic Data (Guo et. al, 2024)",
        description: "Abstracts, stories, and summaries from \"The Curious Decline of Linguistic Diversity\"",
        citation: Some("Guo, Y., Shang, G., Vazirgiannis, M., & Clavel, C. (2023). The Curious Decline of Linguistic Diversity: Training Language Models on Synthetic Text. NAACL-HLT."),
        kind: DatasetKind::Collection {
            datasets: SYNTHETIC,
        },
    },
];

impl DatasetCategory {
    pub fn find(id: &str) -> Option<&'static DatasetCategory> {
        CATEGORIES.iter().find(|c| c.id == id)
    }

    pub fn datasets(&self) -> &'static [Dataset] {
        match self.kind {
            DatasetKind::Single { .. } => &[],
            DatasetKind::Collection { datasets } => datasets,
        }
    }

    /// Resolve the backend id and file name of a selection.
    ///
    /// Single categories are their own dataset; collections need a dataset id.
    pub fn resolve(&self, dataset_id: Option<&str>) -> Option<(&'static str, &'static str)> {
        match (self.kind, dataset_id) {
            (DatasetKind::Single { file }, None) => Some((self.id, file)),
            (DatasetKind::Collection { datasets }, Some(id)) => datasets
                .iter()
                .find(|d| d.id == id)
                .map(|d| (d.id, d.file)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dataset_ids_are_unique() {
        let mut seen = HashSet::new();
        for category in CATEGORIES {
            assert!(seen.insert(category.id), "duplicate {}", category.id);
            for dataset in category.datasets() {
                assert!(seen.insert(dataset.id), "duplicate {}", dataset.id);
            }
        }
    }

    #[test]
    fn test_resolve_single_and_collection() {
        let nature = DatasetCategory::find("nature").unwrap();
        assert_eq!(nature.resolve(None), Some(("nature", "nature_examples.txt")));
        assert_eq!(nature.resolve(Some("cnn_gpt4")), None);

        let paper = DatasetCategory::find("paper").unwrap();
        assert_eq!(paper.resolve(Some("cnn_gpt4")), Some(("cnn_gpt4", "cnn_GPT-4.txt")));
        assert_eq!(paper.resolve(None), None);
        assert_eq!(paper.resolve(Some("story_1")), None);
    }

    #[test]
    fn test_example_corpus_is_nonempty() {
        let lines = EXAMPLE_CORPUS.lines().filter(|l| !l.trim().is_empty()).count();
        assert!(lines > 50);
    }
}
