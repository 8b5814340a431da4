use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use analysis_core::{Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Confidence, MarketDataProvider, NewsArticle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use crate::round2;

pub const NAME: &str = "sentiment";

const NEWS_LIMIT: usize = 30;

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't", "won't",
    "wouldn't", "couldn't", "shouldn't", "hardly", "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "gains", "profit", "growth", "beat", "beats", "upgrade", "outperform",
    "strong", "positive", "rise", "rises", "increase", "breakthrough", "success", "exceed", "exceeds",
    "momentum", "buy", "optimistic", "record", "advance", "dividend", "buyback", "repurchase", "upside",
    "recovery", "rebound", "expansion", "robust", "accelerating", "overweight", "raised", "upgraded",
    "outpacing", "tailwind", "order", "wins",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "fall", "falls", "plunge", "crash", "miss", "misses", "downgrade",
    "underperform", "weak", "negative", "drop", "decrease", "concern", "risk", "fail", "disappoint", "slump",
    "sell", "warning", "pessimistic", "retreat", "fear", "trouble", "dilution", "headwind", "lawsuit",
    "litigation", "recall", "investigation", "probe", "default", "bankruptcy", "layoff", "downside",
    "overvalued", "underweight", "lowered", "suspended", "penalty", "fined", "raid", "raids", "ban", "banned",
    "grounded", "disruption",
];

/// News event classes and their importance in the weighted average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NewsEvent {
    Earnings,
    MergersAcq,
    Regulatory,
    AnalystAction,
    Management,
    Product,
    Legal,
    Macro,
    General,
}

impl NewsEvent {
    pub(crate) fn importance(&self) -> f64 {
        match self {
            NewsEvent::Earnings => 2.0,
            NewsEvent::MergersAcq => 2.5,
            NewsEvent::Regulatory => 2.0,
            NewsEvent::AnalystAction => 1.5,
            NewsEvent::Management => 1.3,
            NewsEvent::Product => 1.2,
            NewsEvent::Legal => 1.5,
            NewsEvent::Macro => 0.8,
            NewsEvent::General => 1.0,
        }
    }
}

pub(crate) fn classify_event(text: &str) -> NewsEvent {
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["earnings", "quarterly", "guidance", "results", "q1", "q2", "q3", "q4", "eps"]) {
        NewsEvent::Earnings
    } else if has(&["acqui", "merger", "buyout", "takeover", "demerger", "stake sale"]) {
        NewsEvent::MergersAcq
    } else if has(&["sebi", "regulat", "approval", "antitrust", "compliance", "dgca", "audit"]) {
        NewsEvent::Regulatory
    } else if has(&["upgrade", "downgrade", "price target", "target price", "initiat", "analyst", "rating"]) {
        NewsEvent::AnalystAction
    } else if has(&["ceo", "cfo", "board", "executive", "resign", "appoint", "managing director"]) {
        NewsEvent::Management
    } else if has(&["launch", "product", "recall", "patent"]) {
        NewsEvent::Product
    } else if has(&["lawsuit", "litigation", "settlement", "sued", "court", "tribunal"]) {
        NewsEvent::Legal
    } else if has(&["rbi", "repo rate", "interest rate", "inflation", "gdp", "fiscal"]) {
        NewsEvent::Macro
    } else {
        NewsEvent::General
    }
}

/// Net lexicon hits in `text`; a polar word within three words after a
/// negation flips sign.
pub(crate) fn lexicon_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '(' | ')'))
        .filter(|w| !w.is_empty())
        .collect();

    let positive: HashSet<&str> = POSITIVE_WORDS.iter().copied().collect();
    let negative: HashSet<&str> = NEGATIVE_WORDS.iter().copied().collect();
    let negations: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| NEGATION_WORDS.contains(*w))
        .map(|(i, _)| i)
        .collect();

    words.iter().enumerate().fold(0, |score, (i, word)| {
        let polarity = if positive.contains(word) {
            1
        } else if negative.contains(word) {
            -1
        } else {
            return score;
        };
        let negated = negations.iter().any(|&n| n < i && i - n <= NEGATION_WINDOW);
        score + if negated { -polarity } else { polarity }
    })
}

/// Title counts double
pub(crate) fn article_score(article: &NewsArticle) -> f64 {
    let mut score = lexicon_score(&article.title) as f64 * 2.0;
    if let Some(desc) = &article.description {
        score += lexicon_score(desc) as f64;
    }
    score
}

pub(crate) fn recency_weight(published: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - published).num_hours();
    if age_hours < 24 {
        1.0
    } else if age_hours < 48 {
        0.7
    } else if age_hours < 168 {
        0.4
    } else {
        0.2
    }
}

fn entity_weight(article: &NewsArticle, symbol: &str) -> f64 {
    if article.tickers.is_empty() {
        return 1.0;
    }
    if article.tickers.iter().any(|t| t.eq_ignore_ascii_case(symbol)) {
        if article.tickers.len() <= 2 {
            1.5
        } else {
            1.2
        }
    } else {
        0.5
    }
}

/// Lexicon news sentiment with event-importance and recency weighting.
pub struct SentimentAgent {
    provider: Arc<dyn MarketDataProvider>,
}

impl SentimentAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Agent for SentimentAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let news = self.provider.fetch_news(symbol, NEWS_LIMIT).await?;
        if news.is_empty() {
            return Ok(AgentResult::new(
                NAME,
                symbol,
                50.0,
                Confidence::Low,
                vec![AgentSignal::new("NEWS_SENTIMENT", "No news", "Neutral")],
                format!("No recent news for {symbol}"),
            ));
        }

        let now = context.analysis_time;
        let mut total = 0.0;
        let mut total_weight = 0.0;
        let (mut positive, mut negative, mut neutral) = (0usize, 0usize, 0usize);
        let mut events: HashMap<NewsEvent, usize> = HashMap::new();

        for article in &news {
            let raw = article_score(article);
            let event = classify_event(&article.text());
            *events.entry(event).or_default() += 1;

            let weight = recency_weight(article.published_utc, now) * entity_weight(article, symbol) * event.importance();
            total += raw * weight;
            total_weight += weight;

            match raw.partial_cmp(&0.0) {
                Some(std::cmp::Ordering::Greater) => positive += 1,
                Some(std::cmp::Ordering::Less) => negative += 1,
                _ => neutral += 1,
            }
        }

        let avg = if total_weight > 0.0 { total / total_weight } else { 0.0 };
        // Squash to (-1, 1): an average of three net hits is a strong read
        let net = (avg / 3.0).tanh();
        let score = 50.0 + 50.0 * net;
        debug!(symbol, articles = news.len(), net, "news sentiment");

        let label = if score > 65.0 {
            "Bullish"
        } else if score < 35.0 {
            "Bearish"
        } else {
            "Neutral"
        };
        let mut signals = vec![AgentSignal::new("NEWS_SENTIMENT", format!("net {net:+.2}"), label)];
        let dominant = events
            .iter()
            .filter(|(e, _)| **e != NewsEvent::General)
            .max_by_key(|(_, n)| **n)
            .map(|(e, _)| *e);
        if let Some(event) = dominant {
            signals.push(AgentSignal::new("NEWS_EVENT", format!("{event:?}"), label));
        }

        let confidence = if news.len() >= 5 && net.abs() > 0.3 {
            Confidence::High
        } else if news.len() >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let reasoning = format!(
            "{} news flow across {} articles ({positive} positive, {negative} negative, {neutral} neutral)",
            label,
            news.len()
        );
        let headlines: Vec<&str> = news.iter().take(5).map(|a| a.title.as_str()).collect();

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "news_count": news.len(),
            "positive_count": positive,
            "negative_count": negative,
            "neutral_count": neutral,
            "net_sentiment": round2(net),
            "recent_headlines": headlines,
        })))
    }
}
