use serde::{Deserialize, Serialize};
use soldy_core::config::AssistantConfig;
use soldy_core::text;

use crate::postprocess::contains_currency_amount;

pub const PRICE_REPLY: &str = "Para precios y compras, ¿estás en Río Grande o Ushuaia?";
pub const COOLING_REPLY: &str = "Por ahora solo asesoramos sobre calefacción y agua caliente \
     sanitaria. No trabajamos equipos de aire acondicionado ni refrigeración, pero con gusto te \
     ayudo a calefaccionar tu hogar.";

const PRICE_KEYWORDS: &[&str] = &[
    "precio",
    "precios",
    "cuesta",
    "cuestan",
    "cuanto sale",
    "cuanto salen",
    "cuanto vale",
    "costo",
    "costos",
    "descuento",
    "descuentos",
    "promocion",
    "oferta",
    "financiacion",
    "cuotas",
    "price",
    "cost",
];

const COOLING_KEYWORDS: &[&str] = &[
    "aire acondicionado",
    "aires acondicionados",
    "split",
    "enfriar",
    "refrigeracion",
    "refrigerar",
    "climatizar el verano",
    "frio/calor",
    "air conditioning",
    "cooling",
];

const HEATING_KEYWORDS: &[&str] =
    &["calefac", "calentar", "caldera", "radiador", "agua caliente", "termotanque", "calefon"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    RioGrande,
    Ushuaia,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Self::RioGrande, Self::Ushuaia];

    pub fn label(self) -> &'static str {
        match self {
            Self::RioGrande => "Río Grande",
            Self::Ushuaia => "Ushuaia",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let folded = text::fold(raw.trim());
        Self::ALL.into_iter().find(|branch| {
            folded == text::fold(branch.label()) || folded == format!("{branch:?}").to_lowercase()
        })
    }

    pub fn contact(self) -> BranchContact {
        match self {
            Self::RioGrande => BranchContact {
                branch: self,
                name: "Sucursal Río Grande - Soldasur",
                address: "Av. San Martín 1234, Río Grande, Tierra del Fuego",
                phone: "+54 2964 123456",
                email: "riogrande@soldasur.com",
            },
            Self::Ushuaia => BranchContact {
                branch: self,
                name: "Sucursal Ushuaia - Soldasur",
                address: "Calle 9 de Julio 210, Ushuaia, Tierra del Fuego",
                phone: "+54 2901 654321",
                email: "ushuaia@soldasur.com",
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchContact {
    pub branch: Branch,
    pub name: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
}

impl BranchContact {
    pub fn message(&self) -> String {
        format!(
            "{}\nDirección: {}\nTeléfono: {}\nEmail: {}",
            self.name, self.address, self.phone, self.email
        )
    }
}

/// Canned reply produced without calling the text generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterceptedReply {
    pub text: String,
    pub quick_replies: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Intercept { reason_code: &'static str, reply: InterceptedReply },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub price_interceptor: bool,
    pub cooling_interceptor: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { price_interceptor: true, cooling_interceptor: true }
    }
}

impl From<&AssistantConfig> for GuardrailPolicy {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            price_interceptor: config.price_interceptor,
            cooling_interceptor: config.cooling_interceptor,
        }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, message: &str) -> GuardrailDecision {
        if self.price_interceptor && is_price_question(message) {
            return GuardrailDecision::Intercept {
                reason_code: "price_redirect",
                reply: InterceptedReply {
                    text: PRICE_REPLY.to_owned(),
                    quick_replies: Branch::ALL.iter().map(|b| b.label().to_owned()).collect(),
                },
            };
        }
        if self.cooling_interceptor && is_cooling_question(message) {
            return GuardrailDecision::Intercept {
                reason_code: "cooling_out_of_scope",
                reply: InterceptedReply { text: COOLING_REPLY.to_owned(), quick_replies: Vec::new() },
            };
        }
        GuardrailDecision::Allow
    }
}

fn matches_keyword(folded: &str, keyword: &str) -> bool {
    if keyword.contains(' ') || keyword.contains('/') {
        folded.contains(keyword)
    } else {
        text::contains_word(folded, keyword)
    }
}

pub fn is_price_question(message: &str) -> bool {
    let folded = text::fold(message);
    PRICE_KEYWORDS.iter().any(|keyword| matches_keyword(&folded, keyword))
        || contains_currency_amount(message)
}

/// Cooling requests, unless the user also talks about heating or hot water.
pub fn is_cooling_question(message: &str) -> bool {
    let folded = text::fold(message);
    let cooling = COOLING_KEYWORDS.iter().any(|keyword| matches_keyword(&folded, keyword));
    cooling && !text::contains_any(&folded, HEATING_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::{
        is_cooling_question, is_price_question, Branch, GuardrailDecision, GuardrailPolicy,
        PRICE_REPLY,
    };

    #[test]
    fn price_question_is_redirected_to_branches() {
        let decision = GuardrailPolicy::default().evaluate("¿Cuánto cuesta la Prima Tec Smart?");

        let (reason_code, reply) = match decision {
            GuardrailDecision::Intercept { reason_code, reply } => (reason_code, reply),
            GuardrailDecision::Allow => ("", Default::default()),
        };
        assert_eq!(reason_code, "price_redirect");
        assert_eq!(reply.text, PRICE_REPLY);
        assert_eq!(reply.quick_replies, vec!["Río Grande", "Ushuaia"]);
    }

    #[test]
    fn price_detection_covers_keywords_and_amounts() {
        assert!(is_price_question("¿Qué precio tiene el Broen?"));
        assert!(is_price_question("¿me hacen descuento?"));
        assert!(is_price_question("¿la dejan en $ 500.000?"));
        assert!(!is_price_question("¿Qué caldera me conviene para 80 m²?"));
        assert!(!is_price_question("¿Qué valoración tiene?"));
    }

    #[test]
    fn technical_value_questions_reach_the_model() {
        assert!(!is_price_question("¿qué valor de potencia necesito?"));
        assert!(!is_price_question("¿Cuál es el valor de kcal/h del Broen Plus 800?"));
        assert_eq!(
            GuardrailPolicy::default().evaluate("¿qué valor de potencia necesito?"),
            GuardrailDecision::Allow
        );
    }

    #[test]
    fn cooling_question_is_out_of_scope_unless_heating_mentioned() {
        assert!(is_cooling_question("¿tienen aire acondicionado?"));
        assert!(is_cooling_question("quiero un split para el verano"));
        assert!(!is_cooling_question("¿el aire acondicionado sirve como calefacción?"));
        assert!(!is_cooling_question("necesito una caldera"));

        let decision = GuardrailPolicy::default().evaluate("¿tienen aire acondicionado?");
        assert!(matches!(
            decision,
            GuardrailDecision::Intercept { reason_code: "cooling_out_of_scope", ref reply }
                if reply.quick_replies.is_empty()
        ));
    }

    #[test]
    fn disabled_interceptors_allow_everything() {
        let policy = GuardrailPolicy { price_interceptor: false, cooling_interceptor: false };

        assert_eq!(policy.evaluate("¿Cuánto cuesta?"), GuardrailDecision::Allow);
        assert_eq!(policy.evaluate("¿tienen aire acondicionado?"), GuardrailDecision::Allow);
    }

    #[test]
    fn branch_cards_are_structured() {
        assert_eq!(Branch::parse("rio grande"), Some(Branch::RioGrande));
        assert_eq!(Branch::parse("USHUAIA"), Some(Branch::Ushuaia));
        assert_eq!(Branch::parse("Tolhuin"), None);

        let card = Branch::Ushuaia.contact();
        assert_eq!(card.phone, "+54 2901 654321");
        assert!(card.message().contains("ushuaia@soldasur.com"));
    }
}
