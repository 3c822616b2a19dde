//! Generation context and system instructions

use nathia_core::{Message, Role};
use serde::{Deserialize, Serialize};

/// Persona and ground rules for every generated reply
pub const BASE_INSTRUCTION: &str = "Você é a NatIA, uma assistente acolhedora para mães e \
gestantes. Responda em português do Brasil, com empatia e sem julgamentos. Não faça \
diagnósticos médicos; quando o assunto for de saúde, oriente a procurar um profissional.";

/// Added when the user shows signs of distress
pub const WATCH_INSTRUCTION: &str = "A usuária demonstra sinais de sofrimento emocional. \
Valide os sentimentos dela antes de qualquer orientação, use frases curtas e lembre que \
pedir ajuda é um sinal de força.";

/// Profile fields shared with the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserProfile {
    pub name: Option<String>,
    /// Gestação, pós-parto, ...
    pub stage: Option<String>,
    pub baby_age_weeks: Option<u32>,
    pub interests: Vec<String>,
}

impl UserProfile {
    fn describe(&self) -> Option<String> {
        let mut fields = Vec::new();
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            fields.push(format!("nome: {}", name.trim()));
        }
        if let Some(stage) = self.stage.as_deref().filter(|s| !s.trim().is_empty()) {
            fields.push(format!("fase: {}", stage.trim()));
        }
        if let Some(weeks) = self.baby_age_weeks {
            fields.push(format!("idade do bebê: {} semanas", weeks));
        }
        if !self.interests.is_empty() {
            fields.push(format!("interesses: {}", self.interests.join(", ")));
        }
        (!fields.is_empty()).then(|| fields.join("; "))
    }
}

/// Context block: profile line plus at most the last `max_turns` messages
pub fn build_context(history: &[Message], profile: Option<&UserProfile>, max_turns: usize) -> String {
    let mut sections = Vec::new();

    if let Some(description) = profile.and_then(UserProfile::describe) {
        sections.push(format!("Perfil: {}", description));
    }

    let start = history.len().saturating_sub(max_turns);
    let recent: Vec<String> = history[start..]
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Mãe",
                Role::Assistant => "NatIA",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect();

    if !recent.is_empty() {
        sections.push(format!("Histórico recente:\n{}", recent.join("\n")));
    }

    sections.join("\n\n")
}

/// System instruction for a turn
pub fn system_instruction(distressed: bool) -> String {
    if distressed {
        format!("{}\n\n{}", BASE_INSTRUCTION, WATCH_INSTRUCTION)
    } else {
        BASE_INSTRUCTION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("pergunta {}", i))
                } else {
                    Message::assistant(format!("resposta {}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_only_last_turns_included() {
        let context = build_context(&history(5), None, 3);
        assert!(!context.contains("pergunta 0"));
        assert!(!context.contains("resposta 1"));
        assert!(context.contains("Mãe: pergunta 2"));
        assert!(context.contains("NatIA: resposta 3"));
        assert!(context.contains("Mãe: pergunta 4"));
    }

    #[test]
    fn test_profile_fields() {
        let profile = UserProfile {
            name: Some("Ana".to_string()),
            stage: Some("pós-parto".to_string()),
            baby_age_weeks: Some(6),
            interests: vec!["sono".to_string()],
        };
        let context = build_context(&[], Some(&profile), 3);
        assert_eq!(
            context,
            "Perfil: nome: Ana; fase: pós-parto; idade do bebê: 6 semanas; interesses: sono"
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(build_context(&[], Some(&UserProfile::default()), 3), "");
    }

    #[test]
    fn test_watch_instruction_appended() {
        assert!(system_instruction(true).contains(WATCH_INSTRUCTION));
        assert_eq!(system_instruction(false), BASE_INSTRUCTION);
    }
}
