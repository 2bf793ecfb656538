//! Question bank entities.

use std::{collections::HashMap, fmt, path::Path};

use tracing::{debug, info};

use crate::{
    error::{CoreError, Result},
    xml::Element,
};

/// Question type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Multichoice,
    Numerical,
    Essay,
    /// Instructional text, not a scored question.
    Description,
    Other(String),
}

impl QuestionKind {
    /// Determine the kind from a Moodle `qtype` value.
    pub fn from_qtype(qtype: &str) -> Self {
        match qtype {
            "multichoice" => Self::Multichoice,
            "numerical" => Self::Numerical,
            "essay" => Self::Essay,
            "description" => Self::Description,
            other => Self::Other(other.to_string()),
        }
    }

    /// The raw `qtype` value.
    pub fn qtype(&self) -> &str {
        match self {
            Self::Multichoice => "multichoice",
            Self::Numerical => "numerical",
            Self::Essay => "essay",
            Self::Description => "description",
            Self::Other(qtype) => qtype,
        }
    }
}

/// A possible answer to a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub id: String,
    pub text: String,
    /// Score fraction in `[-1, 1]`.
    pub fraction: Option<f64>,
    pub feedback: Option<String>,
    /// Accepted error, numerical questions only.
    pub tolerance: Option<f64>,
}

/// A question from the bank.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    /// Context of the enclosing question category.
    pub context_id: Option<String>,
    /// Pre-filled response, essay questions only.
    pub response_template: Option<String>,
    pub answers: Vec<Answer>,
}

/// How a quiz slot names its question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuestionRef {
    /// A question id (`questionid`, older backups).
    Id(String),
    /// A question bank entry (`question_reference/questionbankentryid`),
    /// standing for the latest version of the entry.
    BankEntry(String),
}

impl fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => f.write_str(id),
            Self::BankEntry(id) => write!(f, "bank entry {id}"),
        }
    }
}

/// Placement of a question inside one quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionInstance {
    pub question: QuestionRef,
    pub page: u32,
    pub slot: u32,
    /// Points for this placement, independent of answer fractions.
    pub max_mark: f64,
}

impl QuestionInstance {
    /// Read a `question_instance` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        let question = match element.child_text("questionid") {
            Some(id) => QuestionRef::Id(id.trim().to_string()),
            None => element
                .path("question_reference/questionbankentryid")
                .and_then(Element::text)
                .map(|id| QuestionRef::BankEntry(id.trim().to_string()))
                .ok_or_else(|| CoreError::missing_field(element.name(), "questionid"))?,
        };

        Ok(Self {
            question,
            page: parse_number(element, "page")?,
            slot: parse_number(element, "slot")?,
            max_mark: element
                .child_text("maxmark")
                .map(|v| parse_float("maxmark", v))
                .transpose()?
                .unwrap_or(1.0),
        })
    }
}

/// All questions in a backup, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: HashMap<String, Question>,
    /// Bank entry id -> (version, question id) of its latest version.
    entries: HashMap<String, (u32, String)>,
}

/// Enclosing category, bank entry and version while walking the document.
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'a> {
    context_id: Option<&'a str>,
    entry_id: Option<&'a str>,
    version: u32,
}

impl QuestionBank {
    /// Load the bank from `questions.xml`; a missing file yields an empty bank.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no question bank in backup");
            return Ok(Self::default());
        }
        let root = Element::load(path)?;
        let bank = Self::from_root(&root)?;
        info!(count = bank.len(), "loaded question bank");
        Ok(bank)
    }

    /// Build the bank from the document root.
    ///
    /// Categories may be nested at any depth (bank entries and versions in
    /// newer backups), so every `question` element with an id is collected,
    /// tagged with the context of its closest enclosing category.
    pub fn from_root(root: &Element) -> Result<Self> {
        let mut bank = Self::default();
        bank.collect(root, Scope::default())?;
        Ok(bank)
    }

    fn collect<'a>(&mut self, element: &'a Element, mut scope: Scope<'a>) -> Result<()> {
        match element.name() {
            "question_category" => {
                scope.context_id = element.child_text("contextid").or(scope.context_id);
            }
            "question_bank_entry" => {
                scope.entry_id = element.attr("id");
                scope.version = 0;
            }
            "question_versions" | "question_version" => {
                if let Some(version) = element.child_text("version") {
                    scope.version = version
                        .trim()
                        .parse()
                        .map_err(|_| CoreError::invalid_value("version", version))?;
                }
            }
            _ => {}
        }

        for child in element.children() {
            if child.name() == "question" && child.attr("id").is_some() {
                let question = parse_question(child, scope.context_id)?;
                if let Some(entry_id) = scope.entry_id {
                    self.record_version(entry_id, scope.version, &question.id);
                }
                self.questions.insert(question.id.clone(), question);
            } else {
                self.collect(child, scope)?;
            }
        }
        Ok(())
    }

    fn record_version(&mut self, entry_id: &str, version: u32, question_id: &str) {
        let latest = self
            .entries
            .entry(entry_id.to_string())
            .or_insert_with(|| (version, question_id.to_string()));
        if version >= latest.0 {
            *latest = (version, question_id.to_string());
        }
    }

    /// Add a question, replacing any with the same id.
    pub fn insert(&mut self, question: Question) {
        self.questions.insert(question.id.clone(), question);
    }

    /// Look up a question by id.
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    /// Look up the question a quiz slot refers to.
    ///
    /// Bank entries resolve to the question of their highest version.
    pub fn resolve(&self, reference: &QuestionRef) -> Option<&Question> {
        match reference {
            QuestionRef::Id(id) => self.get(id),
            QuestionRef::BankEntry(entry_id) => {
                let (_, question_id) = self.entries.get(entry_id)?;
                self.get(question_id)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

fn parse_question(element: &Element, context_id: Option<&str>) -> Result<Question> {
    let id = element.require_attr("id")?.to_string();
    let kind = QuestionKind::from_qtype(element.require_text("qtype")?.trim());

    let plugin = element.descendant(&format!("plugin_qtype_{}_question", kind.qtype()));

    // Tolerances are stored beside the answers, keyed by answer id.
    let tolerances: HashMap<&str, f64> = match (&kind, plugin) {
        (QuestionKind::Numerical, Some(plugin)) => plugin
            .descendants("numerical_record")
            .into_iter()
            .filter_map(|record| {
                let answer = record.child_text("answer")?.trim();
                let tolerance = record.child_text("tolerance")?.trim().parse().ok()?;
                Some((answer, tolerance))
            })
            .collect(),
        _ => HashMap::new(),
    };

    let answers = match plugin.and_then(|p| p.descendant("answers")) {
        Some(answers) => answers
            .children_named("answer")
            .map(|answer| parse_answer(answer, &tolerances))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let response_template = match kind {
        QuestionKind::Essay => plugin
            .and_then(|p| p.descendant("responsetemplate"))
            .and_then(Element::text)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string),
        _ => None,
    };

    Ok(Question {
        id,
        text: element.child_text("questiontext").unwrap_or_default().to_string(),
        kind,
        context_id: context_id.map(str::to_string),
        response_template,
        answers,
    })
}

fn parse_answer(element: &Element, tolerances: &HashMap<&str, f64>) -> Result<Answer> {
    let id = element.require_attr("id")?.to_string();
    let fraction = element
        .child_text("fraction")
        .map(|v| parse_float("fraction", v))
        .transpose()?;
    let feedback = element
        .child_text("feedback")
        .filter(|f| !f.trim().is_empty())
        .map(str::to_string);

    Ok(Answer {
        tolerance: tolerances.get(id.as_str()).copied(),
        text: element.child_text("answertext").unwrap_or_default().to_string(),
        id,
        fraction,
        feedback,
    })
}

fn parse_number(element: &Element, field: &str) -> Result<u32> {
    let value = element.require_text(field)?;
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::invalid_value(field, value))
}

fn parse_float(field: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::invalid_value(field, value))
}
