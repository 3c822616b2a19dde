//! Keyword lists and text folding
//!
//! Lists are ranked: matches are always reported in list order. The
//! default lexicon is Brazilian Portuguese; deployments can override any
//! list from YAML.

use nathia_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lower-case the text and strip Portuguese diacritics.
///
/// Keywords and input go through the same folding, so `"Você"`,
/// `"VOCE"` and `"voce"` all match the keyword `"você"`.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Ranked keyword lists for every dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Any match forces the `risk` level
    pub high_risk: Vec<String>,
    /// Signals of distress that warrant watching
    pub watch: Vec<String>,
    /// Judgemental phrasing aimed at other mothers
    pub judgement: Vec<String>,
    /// Insults and hostile language
    pub toxicity: Vec<String>,
    pub positive: Vec<String>,
    pub calm: Vec<String>,
    pub sadness: Vec<String>,
    pub anxiety: Vec<String>,
    pub exhaustion: Vec<String>,
}

impl Lexicon {
    /// Load from YAML string; missing lists fall back to the defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid lexicon: {}", e)))
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            high_risk: words(&[
                "quero morrer",
                "vou me matar",
                "me matar",
                "suicídio",
                "tirar minha vida",
                "acabar com a minha vida",
                "acabar com tudo",
                "não quero mais viver",
                "não aguento mais viver",
                "melhor sem mim",
                "machucar meu bebê",
                "machucar o bebê",
                "fazer mal ao bebê",
                "me machucar",
                "me cortar",
                "sumir para sempre",
            ]),
            watch: words(&[
                "não aguento",
                "exausta",
                "esgotada",
                "sozinha",
                "desesperada",
                "sem esperança",
                "choro todo dia",
                "choro o tempo todo",
                "não consigo dormir",
                "não durmo",
                "ansiosa",
                "ansiedade",
                "culpada",
                "fracassada",
                "péssima mãe",
                "não sinto nada",
                "vazia",
                "sobrecarregada",
                "tristeza",
                "rejeito meu bebê",
            ]),
            judgement: words(&[
                "você deveria",
                "você tem que",
                "você precisa",
                "mães de verdade",
                "mãe de verdade",
                "toda mãe",
                "boa mãe",
                "deveria ter",
                "não deveria",
                "irresponsável",
                "egoísta",
                "preguiçosa",
                "no meu tempo",
                "frescura",
                "exagero",
                "que absurdo",
                "obrigação de mãe",
                "nunca dê",
            ]),
            toxicity: words(&[
                "idiota",
                "burra",
                "estúpida",
                "imbecil",
                "ridícula",
                "patética",
                "nojenta",
                "inútil",
                "lixo",
                "cala a boca",
                "que vergonha",
                "louca",
                "desgraça",
                "odeio",
            ]),
            positive: words(&[
                "feliz",
                "alegria",
                "amor",
                "amando",
                "grata",
                "gratidão",
                "orgulho",
                "consegui",
                "conseguimos",
                "melhorando",
                "esperança",
                "maravilhoso",
                "lindo",
                "ótimo",
            ]),
            calm: words(&[
                "tranquila",
                "aliviada",
                "calma",
                "em paz",
                "serena",
                "descansada",
            ]),
            sadness: words(&[
                "triste",
                "tristeza",
                "choro",
                "chorando",
                "vazia",
                "sozinha",
                "solidão",
                "sem esperança",
            ]),
            anxiety: words(&[
                "ansiosa",
                "ansiedade",
                "medo",
                "preocupada",
                "nervosa",
                "pânico",
                "angústia",
            ]),
            exhaustion: words(&[
                "cansada",
                "exausta",
                "esgotada",
                "sem dormir",
                "não durmo",
                "sobrecarregada",
                "não aguento",
            ]),
        }
    }
}
