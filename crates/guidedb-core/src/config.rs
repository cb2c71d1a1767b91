//! Configuration surface for the retrieval engine.
//!
//! Uses Figment to merge built-in defaults + `guidedb.toml` +
//! `guidedb.<env>.toml` + `GUIDEDB_*` env vars. Every knob has a default,
//! so an absent config file yields a working engine.

use std::collections::HashMap;
use std::env;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::{Intent, IntentWeights};

/// All recognized engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// "rrf" | "weighted" | "max".
    pub fusion_method: String,
    /// RRF rank constant.
    pub rrf_k: f64,
    /// Fallback weight pair for unmapped intents.
    pub default_weights: IntentWeights,
    /// Intent-specific weight pairs; the single source of truth for
    /// adaptive weighting.
    pub intent_weights: HashMap<Intent, IntentWeights>,
    /// Canonical entity name -> boost factor applied after fusion.
    pub entity_boosts: HashMap<String, f64>,
    /// Canonical entity name -> alias variants, applied identically on
    /// the index and query sides.
    pub aliases: HashMap<String, Vec<String>>,
    /// Tokens dropped during tokenization. Domain terms the caller wants
    /// kept must not appear here.
    pub stop_words: Vec<String>,
    /// Maximum number of cached responses.
    pub cache_capacity: usize,
    /// Optional cache entry lifetime; `None` disables expiry.
    pub cache_ttl_secs: Option<u64>,
    /// Independent timeout for each retrieval source.
    pub source_timeout_ms: u64,
    /// Each source is asked for `overfetch * top_k` candidates so the
    /// fusion stage has headroom beyond the final cut.
    pub overfetch: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            fusion_method: "rrf".to_string(),
            rrf_k: 60.0,
            default_weights: IntentWeights { lexical: 0.5, vector: 0.5 },
            intent_weights: default_intent_weights(),
            entity_boosts: default_entity_boosts(),
            aliases: default_aliases(),
            stop_words: default_stop_words(),
            cache_capacity: 100,
            cache_ttl_secs: None,
            source_timeout_ms: 2_000,
            overfetch: 2,
        }
    }
}

impl RetrievalConfig {
    /// Load defaults, then `guidedb.toml`, then the `RUST_ENV`-specific
    /// overlay, then `GUIDEDB_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(RetrievalConfig::default()))
            .merge(Toml::file("guidedb.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("guidedb.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("guidedb.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("guidedb.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("GUIDEDB_"));

        let config: RetrievalConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.fusion_method
            .parse::<crate::types::FusionMethod>()
            .map_err(|e| anyhow::anyhow!("invalid fusion_method: {e}"))?;
        if self.overfetch == 0 {
            anyhow::bail!("overfetch must be at least 1");
        }
        Ok(())
    }
}

fn default_intent_weights() -> HashMap<Intent, IntentWeights> {
    let mut m = HashMap::new();
    m.insert(Intent::Weakness, IntentWeights { lexical: 0.6, vector: 0.4 });
    m.insert(Intent::KillMethod, IntentWeights { lexical: 0.5, vector: 0.5 });
    m.insert(Intent::Strategy, IntentWeights { lexical: 0.5, vector: 0.5 });
    m.insert(Intent::WeaponLoadout, IntentWeights { lexical: 0.7, vector: 0.3 });
    m.insert(Intent::BuildGuide, IntentWeights { lexical: 0.7, vector: 0.3 });
    m.insert(Intent::GeneralInfo, IntentWeights { lexical: 0.6, vector: 0.4 });
    m
}

fn default_entity_boosts() -> HashMap<String, f64> {
    [
        ("bile titan", 1.8),
        ("hulk", 1.6),
        ("factory strider", 1.5),
        ("charger", 1.4),
        ("tank", 1.3),
        ("impaler", 1.2),
        ("devastator", 1.1),
        ("brood commander", 1.1),
        ("stalker", 1.1),
        ("berserker", 1.0),
        ("gunship", 1.0),
        ("dropship", 1.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_aliases() -> HashMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("bile titan", &["biletitan", "bile_titan", "bt", "胆汁泰坦", "胆汁巨人", "酸液泰坦"]),
        ("hulk", &["hulk devastator", "巨人机甲", "机甲巨人", "巨型机甲"]),
        ("charger", &["behemoth charger", "冲锋者", "巨兽冲锋者", "重装冲锋者"]),
        ("impaler", &["穿刺者", "尖刺者", "触手怪"]),
        ("brood commander", &["族群指挥官", "首领虫"]),
        ("stalker", &["潜行者", "隐身虫", "隐形者"]),
        ("factory strider", &["工厂行者", "机械行者", "巨型步行者"]),
        ("devastator", &["毁灭者", "破坏者"]),
        ("berserker", &["狂战士", "冲锋机器人"]),
        ("gunship", &["dropship gunship", "武装飞船", "武装直升机"]),
        ("tank", &["annihilator tank", "shredder tank", "坦克", "歼灭者坦克"]),
        ("dropship", &["运输舰", "投送舰"]),
    ];
    table
        .iter()
        .map(|(canonical, aliases)| {
            (
                (*canonical).to_string(),
                aliases.iter().map(|a| (*a).to_string()).collect(),
            )
        })
        .collect()
}

fn default_stop_words() -> Vec<String> {
    [
        // English function words
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "should", "could", "can", "may", "might", "must",
        "shall",
        // CJK function words
        "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一个", "上", "也",
        "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "自己", "这",
        // Generic corpus vocabulary; tactical terms deliberately excluded
        "game", "player", "mission", "level",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
