//! Quiz body rendering.

use moodlesite_core::{Answer, Question, QuestionBank, QuestionInstance, QuestionKind};
use thiserror::Error;
use tracing::debug;

/// Quiz rendering errors.
#[derive(Debug, Error)]
pub enum QuizError {
    /// A question instance refers to a question missing from the bank.
    #[error("question {id} not found in question bank")]
    UnknownQuestion { id: String },
}

/// Result type for quiz rendering.
pub type Result<T> = std::result::Result<T, QuizError>;

/// Renders quiz questions and answers as HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuizRenderer;

impl QuizRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Render a quiz body: the intro followed by its questions in (page, slot) order.
    ///
    /// Description questions are shown as instructions and do not take a number.
    pub fn render(
        &self,
        intro: Option<&str>,
        instances: &[QuestionInstance],
        bank: &QuestionBank,
    ) -> Result<String> {
        let mut ordered: Vec<&QuestionInstance> = instances.iter().collect();
        ordered.sort_by_key(|instance| (instance.page, instance.slot));

        let mut html = String::new();
        if let Some(intro) = intro.filter(|i| !i.is_empty()) {
            html.push_str(intro);
            html.push_str("\n<br><br>\n");
        }

        let mut number = 0;
        for instance in ordered {
            let question = bank.resolve(&instance.question).ok_or_else(|| {
                QuizError::UnknownQuestion {
                    id: instance.question.to_string(),
                }
            })?;

            if question.kind == QuestionKind::Description {
                html.push_str("<p><b>Instructions:</b></p>\n");
            } else {
                number += 1;
                html.push_str(&format!(
                    "<p><b>Question {number} ({})</b></p>\n",
                    pointify(instance.max_mark)
                ));
            }
            self.render_question(question, &mut html);
            html.push_str("\n<br>\n");
        }

        debug!(questions = number, "rendered quiz");
        Ok(html)
    }

    fn render_question(&self, question: &Question, html: &mut String) {
        html.push_str(&question.text);

        if let Some(template) = &question.response_template {
            html.push_str("\n<p><i>Response template:</i></p>\n");
            html.push_str(template);
        }

        if question.answers.is_empty() {
            return;
        }

        let (open, close) = match question.kind {
            QuestionKind::Multichoice => ("\n<ol type=\"a\">\n", "</ol>"),
            _ => ("\n<ul>\n", "</ul>"),
        };
        html.push_str(open);
        for answer in &question.answers {
            html.push_str(&render_answer(answer, &question.kind));
        }
        html.push_str(close);
    }
}

fn render_answer(answer: &Answer, kind: &QuestionKind) -> String {
    let mut item = format!("<li>{}", answer.text);

    if *kind == QuestionKind::Numerical
        && let Some(tolerance) = answer.tolerance
    {
        item.push_str(&format!(" +/- {}", trim_number(tolerance)));
    }
    if let Some(fraction) = answer.fraction {
        item.push_str(&format!(" ({})", percentify(fraction)));
    }
    if let Some(feedback) = &answer.feedback {
        item.push_str(&format!("<br><i>Feedback:</i> {feedback}"));
    }

    item.push_str("</li>\n");
    item
}

/// Format with two decimals, then drop trailing zeros and a trailing point.
///
/// `50.00` becomes `50`, `33.30` becomes `33.3`, `33.33` stays.
pub fn trim_number(value: f64) -> String {
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Format a score fraction as a percentage, e.g. `0.5` as `50%`.
pub fn percentify(fraction: f64) -> String {
    format!("{}%", trim_number(fraction * 100.0))
}

/// Format a mark as points, e.g. `1.0` as `1 point` and `2.5` as `2.5 points`.
pub fn pointify(points: f64) -> String {
    let formatted = trim_number(points);
    let unit = if formatted == "1" { "point" } else { "points" };
    format!("{formatted} {unit}")
}

#[cfg(test)]
mod tests {
    use moodlesite_core::QuestionRef;

    use super::*;

    fn question(id: &str, kind: QuestionKind, answers: Vec<Answer>) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Text of {id}"),
            kind,
            context_id: None,
            response_template: None,
            answers,
        }
    }

    fn answer(text: &str, fraction: Option<f64>) -> Answer {
        Answer {
            id: text.to_string(),
            text: text.to_string(),
            fraction,
            feedback: None,
            tolerance: None,
        }
    }

    fn instance(id: &str, page: u32, slot: u32, max_mark: f64) -> QuestionInstance {
        QuestionInstance {
            question: QuestionRef::Id(id.to_string()),
            page,
            slot,
            max_mark,
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(percentify(0.5), "50%");
        assert_eq!(percentify(0.3333), "33.33%");
        assert_eq!(percentify(0.333), "33.3%");
        assert_eq!(percentify(1.0), "100%");
        assert_eq!(percentify(-0.25), "-25%");
        assert_eq!(pointify(1.0), "1 point");
        assert_eq!(pointify(2.5), "2.5 points");
        assert_eq!(pointify(10.0), "10 points");
        assert_eq!(trim_number(0.0), "0");
    }

    #[test]
    fn test_order_by_page_and_slot() {
        let mut bank = QuestionBank::default();
        bank.insert(question("a", QuestionKind::Essay, vec![]));
        bank.insert(question("b", QuestionKind::Essay, vec![]));

        let instances = [instance("b", 1, 2, 1.0), instance("a", 1, 1, 2.0)];
        let html = QuizRenderer::new().render(None, &instances, &bank).unwrap();

        let first = html.find("Question 1 (2 points)").unwrap();
        let second = html.find("Question 2 (1 point)").unwrap();
        assert!(first < second);
        assert!(html.find("Text of a").unwrap() < html.find("Text of b").unwrap());
    }

    #[test]
    fn test_description_not_counted() {
        let mut bank = QuestionBank::default();
        bank.insert(question("d", QuestionKind::Description, vec![]));
        bank.insert(question("q", QuestionKind::Essay, vec![]));

        let instances = [instance("d", 1, 1, 0.0), instance("q", 1, 2, 1.0)];
        let html = QuizRenderer::new().render(Some("Intro"), &instances, &bank).unwrap();

        assert!(html.starts_with("Intro\n<br><br>\n"));
        assert!(html.contains("<b>Instructions:</b>"));
        assert!(html.contains("Question 1 (1 point)"));
        assert!(!html.contains("Question 2"));
    }

    #[test]
    fn test_multichoice_lettered_list() {
        let mut right = answer("Yes", Some(1.0));
        right.feedback = Some("Well done".to_string());
        let mut bank = QuestionBank::default();
        bank.insert(question(
            "m",
            QuestionKind::Multichoice,
            vec![right, answer("No", Some(0.0))],
        ));

        let html = QuizRenderer::new()
            .render(None, &[instance("m", 1, 1, 1.0)], &bank)
            .unwrap();
        assert!(html.contains("<ol type=\"a\">"));
        assert!(html.contains("<li>Yes (100%)<br><i>Feedback:</i> Well done</li>"));
        assert!(html.contains("<li>No (0%)</li>"));
    }

    #[test]
    fn test_numerical_tolerance_and_plain_list() {
        let mut exact = answer("3.14", Some(1.0));
        exact.tolerance = Some(0.01);
        let mut bank = QuestionBank::default();
        bank.insert(question("n", QuestionKind::Numerical, vec![exact, answer("3", None)]));

        let html = QuizRenderer::new()
            .render(None, &[instance("n", 1, 1, 1.0)], &bank)
            .unwrap();
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>3.14 +/- 0.01 (100%)</li>"));
        assert!(html.contains("<li>3</li>"));
    }

    #[test]
    fn test_essay_template() {
        let mut essay = question("e", QuestionKind::Essay, vec![]);
        essay.response_template = Some("Dear reader".to_string());
        let mut bank = QuestionBank::default();
        bank.insert(essay);

        let html = QuizRenderer::new()
            .render(None, &[instance("e", 1, 1, 5.0)], &bank)
            .unwrap();
        assert!(html.contains("Response template:"));
        assert!(html.contains("Dear reader"));
        assert!(!html.contains("<ul>"));
    }

    #[test]
    fn test_bank_entry_slot_uses_entry_question() {
        let xml = r#"<question_categories><question_category id="1">
  <question_bank_entries>
    <question_bank_entry id="3"><question_version><question_versions id="1">
      <version>1</version>
      <questions><question id="7"><questiontext>Entry three</questiontext><qtype>essay</qtype></question></questions>
    </question_versions></question_version></question_bank_entry>
    <question_bank_entry id="9"><question_version><question_versions id="2">
      <version>1</version>
      <questions><question id="3"><questiontext>Question three</questiontext><qtype>essay</qtype></question></questions>
    </question_versions></question_version></question_bank_entry>
  </question_bank_entries>
</question_category></question_categories>"#;
        let bank =
            QuestionBank::from_root(&moodlesite_core::Element::parse_str(xml).unwrap()).unwrap();
        let slot = QuestionInstance {
            question: QuestionRef::BankEntry("3".to_string()),
            page: 1,
            slot: 1,
            max_mark: 1.0,
        };

        let html = QuizRenderer::new().render(None, &[slot], &bank).unwrap();
        assert!(html.contains("Entry three"));
        assert!(!html.contains("Question three"));
    }

    #[test]
    fn test_unknown_question() {
        let err = QuizRenderer::new()
            .render(None, &[instance("x", 1, 1, 1.0)], &QuestionBank::default())
            .unwrap_err();
        assert!(err.to_string().contains("question x"));
    }
}
