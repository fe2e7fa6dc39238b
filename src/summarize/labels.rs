use std::sync::OnceLock;

use regex::Regex;

use crate::util::text::truncate_chars;

use super::UseCase;

const NOTE_MAX_CHARS: usize = 200;
const INFERRED_TITLE_CHARS: usize = 120;
const UNSPECIFIED: &str = "unspecified";

/// Instruction for one excerpt: pick the single most relevant use case and
/// answer in the fixed label format.
pub fn build_prompt(excerpt: &str) -> String {
    format!(
        "You are an expert industrial analyst. Read the article excerpt below and *select the single most relevant AI-in-manufacturing use case*.\n\
Return your answer ONLY in this exact label format (no JSON, no extra commentary except an optional single 'Note:' line at the end):\n\
\n\
Title: <short title>\n\
Problem: <what problem is solved>\n\
AI Solution: <concise description of the AI / ML technique used>\n\
Category: Manufacturing | Logistics | Supply Chain\n\
Industry: <industry name or \"General\">\n\
Note: <optional short note, e.g. \"Article contains other minor use cases\">\n\
\n\
Article excerpt:\n\
{}",
        excerpt.trim()
    )
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(title|problem|ai[\s_-]*solution|category|industry|note)\s*:\s*(.+)$")
            .expect("static label pattern")
    })
}

/// Tolerant parse of a label-format reply. Fence lines and markdown emphasis
/// are ignored, labels match case-insensitively, a missing title falls back to
/// the first unlabeled line and a missing solution is inferred from the
/// problem. None unless both a title and a solution result.
pub fn parse_labelled(reply: &str, keywords: &[String]) -> Option<UseCase> {
    let lines: Vec<String> = reply
        .lines()
        .map(|ln| ln.trim())
        .filter(|ln| !ln.is_empty() && !ln.starts_with("```"))
        .map(|ln| {
            ln.replace("**", "")
                .replace(['[', ']'], "")
                .trim_start_matches(['#', '-', '*', '>', ' '])
                .trim()
                .to_string()
        })
        .filter(|ln| !ln.is_empty())
        .collect();

    let mut uc = UseCase::default();
    for ln in &lines {
        let Some(caps) = label_re().captures(ln) else { continue };
        let value = caps[2].trim().to_string();
        let label = caps[1].to_lowercase();
        match label.as_str() {
            "title" => uc.title = value,
            "problem" => uc.problem = value,
            "category" => uc.category = value,
            "industry" => uc.industry = value,
            "note" => uc.note = value,
            _ => uc.ai_solution = value,
        }
    }

    if uc.title.is_empty() {
        if let Some(ln) = lines.iter().find(|ln| !ln.contains(':') && ln.chars().count() > 10) {
            uc.title = truncate_chars(ln, INFERRED_TITLE_CHARS).trim().to_string();
        }
    }

    if uc.ai_solution.is_empty() && !uc.problem.is_empty() {
        let problem = uc.problem.to_lowercase();
        uc.ai_solution = keywords
            .iter()
            .find(|kw| problem.contains(kw.as_str()))
            .cloned()
            .unwrap_or_else(|| UNSPECIFIED.to_string());
    }

    if uc.title.is_empty() || uc.ai_solution.is_empty() {
        return None;
    }
    Some(uc)
}

/// Keyword hits in the candidate's title/problem/solution weigh 3, hits in the
/// article 1; a title adds 2 and a solution 3.
pub fn score(candidate: &UseCase, article: &str, keywords: &[String]) -> i64 {
    let combined = format!("{} {} {}", candidate.title, candidate.problem, candidate.ai_solution).to_lowercase();
    let article = article.to_lowercase();
    let mut total = 0;
    for kw in keywords {
        if combined.contains(kw.as_str()) {
            total += 3;
        }
        if article.contains(kw.as_str()) {
            total += 1;
        }
    }
    if !candidate.title.is_empty() {
        total += 2;
    }
    if !candidate.ai_solution.is_empty() {
        total += 3;
    }
    total
}

/// Highest-scoring candidate, first one on ties. The titles of the others are
/// appended to its note.
pub fn pick_best(candidates: Vec<UseCase>, article: &str, keywords: &[String]) -> Option<UseCase> {
    let mut scored: Vec<(i64, UseCase)> = candidates
        .into_iter()
        .map(|c| (score(&c, article, keywords), c))
        .collect();
    // stable sort keeps chunk order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let mut iter = scored.into_iter().map(|(_, c)| c);
    let mut winner = iter.next()?;

    let others: Vec<String> = iter
        .map(|c| {
            if c.title.is_empty() {
                truncate_chars(&c.problem, INFERRED_TITLE_CHARS)
            } else {
                c.title
            }
        })
        .filter(|t| !t.is_empty())
        .collect();
    if !others.is_empty() {
        let others = others.join("; ");
        let note = if winner.note.is_empty() { others } else { format!("{}; {}", winner.note, others) };
        winner.note = truncate_chars(note.trim(), NOTE_MAX_CHARS);
    }
    Some(winner)
}
