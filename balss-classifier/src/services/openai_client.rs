//! OpenAI chat-completions client
//!
//! Production [`ProductClassifier`]. Sends the taxonomy and the
//! disambiguation rules with every request, strips markdown fences from the
//! reply and parses the JSON payload. Any failure is an [`AiError`]; no
//! category is ever guessed locally.

use crate::config::AiClientConfig;
use crate::error::AiError;
use crate::types::{AiClassification, ProductClassifier};
use balss_common::db::DEFAULT_CATEGORIES;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("balss-classifier/", env!("CARGO_PKG_VERSION"));
const TEMPERATURE: f32 = 0.1;
const CLASSIFY_MAX_TOKENS: u32 = 1000;
const CORRECT_MAX_TOKENS: u32 = 500;

const CLASSIFY_SYSTEM_MESSAGE: &str =
    "Tu esi eksperts pārtikas produktu klasifikācijā. Atbildi tikai JSON formātā.";

const CORRECT_SYSTEM_MESSAGE: &str = "Tu esi eksperts latviešu valodā. Labo produktu nosaukumus, \
     lai tie būtu gramatiski pareizi. Ja nosaukums jau ir pareizs, atstāj to nemainītu. \
     Atbildi tikai JSON formātā.";

/// Example members per slug, shown to the model next to the slug
fn category_hint(slug: &str) -> &'static str {
    match slug {
        "vegetables" => "dārzeņi: tomāti, gurķi, kartupeļi, sīpoli, burkāni",
        "fruits" => "augļi: āboli, banāni, citrusi, ogas",
        "meat" => "gaļa: liellopa gaļa, vista, desa, maltā gaļa, bekons",
        "fish" => "zivis un jūras veltes: lasis, siļķe, garneles",
        "dairy" => "piena produkti: piens, siers, jogurts, krējums, biezpiens, sviests",
        "eggs" => "olas",
        "bakery" => "maize, kliņģeris, kūkas, bulciņas",
        "grains" => "graudi: rīsi, griķi, makaroni, milti, auzu pārslas",
        "condiments" => "garšvielas un mērces: sāls, pipari, kečups, majonēze",
        "snacks" => "uzkodas: čipsi, saldumi, šokolāde, rieksti",
        "ready_meals" => "gatavie un saldētie ēdieni: pelmeņi, pica, salāti",
        "beverages" => "bezalkoholiskie dzērieni: ūdens, sula, kafija, tēja",
        "alcohol" => "alkohols: vīns, alus, degvīns, sidrs",
        "household" => "mājsaimniecība: tualetes papīrs, trauku līdzeklis, maisiņi",
        "hygiene" => "higiēna: zobu pasta, šampūns, ziepes",
        "pet" => "mājdzīvniekiem: suņu barība, kaķu barība",
        "international" => "starptautiskie produkti: suši, tortiljas, kokosriekstu piens",
        "construction" => "būvniecība: krāsa, skrūves, līme",
        _ => "viss pārējais",
    }
}

/// Build the classification prompt
///
/// Items are embedded as a JSON array so commas inside names survive.
pub fn build_classification_prompt(items: &[String]) -> String {
    let categories = DEFAULT_CATEGORIES
        .iter()
        .map(|(slug, ..)| format!("- {} ({})", slug, category_hint(slug)))
        .collect::<Vec<_>>()
        .join("\n");
    let item_list = serde_json::to_string(items).unwrap_or_else(|_| items.join(", "));

    format!(
        r#"Klasificē šos latviešu pārtikas produktus pēc kategorijām.

Kategorijas:
{categories}

Noteikumi:
- Klasificē pēc pamatprodukta. Ignorē zīmolu, izcelsmi, iepakojumu un citus aprakstošus vārdus ("Valmieras piens" ir piens, "spāņu desa" ir desa).
- Saliktiem nosaukumiem nosaki galveno produktu ("ābolu sula" ir sula, "vistas fileja" ir gaļa).
- Alkoholiskie dzērieni vienmēr ir "alcohol", arī ja tie nosaukti vienkārši par dzērienu.
- Izmanto tikai augstāk minētos kategoriju identifikatorus.
- Atbildē iekļauj katru produktu tieši vienu reizi un tādā pašā secībā.
- Laukā "product" atkārto produkta nosaukumu tieši tā, kā tas dots sarakstā.

Produkti: {item_list}

Atbildi tikai JSON formātā:
[
  {{"product": "produkta_nosaukums", "category": "kategorijas_slug"}}
]"#
    )
}

/// Build the spelling correction prompt
pub fn build_correction_prompt(items: &[String]) -> String {
    let item_list = serde_json::to_string(items).unwrap_or_else(|_| items.join(", "));

    format!(
        r#"Labo šos produktu nosaukumus latviešu valodā: {item_list}

Labo tikai pareizrakstības kļūdas. Zīmolus un aprakstošus vārdus saglabā nemainītus.

Piemēri:
- "biespiena sieriņš" → "biezpiena sieriņš"
- "apelsinu sulu" → "apelsīnu sula"
- "balto vinu" → "baltais vīns"
- "degvins" → "degvīns"
- "kefirs" → "kefīrs"

Atbildi JSON formātā, saglabājot secību:
{{
  "correctedNames": ["labots_nosaukums1", "labots_nosaukums2"]
}}"#
    )
}

/// Remove markdown code fences around a JSON payload
pub fn strip_code_fences(content: &str) -> String {
    content
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassificationPayload {
    List(Vec<AiClassification>),
    Wrapped {
        classifications: Vec<AiClassification>,
    },
}

/// Parse the classifier reply
///
/// Fewer pairs than inputs is an error. Extra pairs are kept; the caller
/// assigns pairs to items by product name.
pub fn parse_classifications(
    content: &str,
    expected: usize,
) -> Result<Vec<AiClassification>, AiError> {
    let cleaned = strip_code_fences(content);

    let payload: ClassificationPayload = serde_json::from_str(&cleaned)
        .map_err(|e| AiError::Parse(format!("{}: {}", e, truncate(&cleaned, 200))))?;
    let classifications = match payload {
        ClassificationPayload::List(list) => list,
        ClassificationPayload::Wrapped { classifications } => classifications,
    };

    if classifications.len() < expected || classifications.is_empty() {
        return Err(AiError::Incomplete {
            expected,
            got: classifications.len(),
        });
    }

    if classifications.len() > expected {
        warn!(
            expected,
            got = classifications.len(),
            "Classifier returned more items than requested"
        );
    }

    Ok(classifications)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorrectionPayload {
    corrected_names: Option<Vec<String>>,
}

/// Parse the spelling correction reply
///
/// A reply without `correctedNames` leaves the names unchanged.
pub fn parse_corrected_names(content: &str, items: &[String]) -> Result<Vec<String>, AiError> {
    let cleaned = strip_code_fences(content);

    let payload: CorrectionPayload = serde_json::from_str(&cleaned)
        .map_err(|e| AiError::Parse(format!("{}: {}", e, truncate(&cleaned, 200))))?;

    let Some(names) = payload.corrected_names else {
        warn!("Correction reply has no correctedNames, keeping input names");
        return Ok(items.to_vec());
    };

    if names.len() != items.len() {
        return Err(AiError::Incomplete {
            expected: items.len(),
            got: names.len(),
        });
    }

    Ok(names)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    config: AiClientConfig,
}

impl OpenAiClient {
    pub fn new(config: AiClientConfig) -> Result<Self, AiError> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::NotConfigured("empty API key".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Send one system + user exchange and return the trimmed reply text
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature: TEMPERATURE,
        };

        debug!(url = %url, model = %self.config.model, "Querying classifier API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), truncate(&body, 500)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AiError::EmptyResponse)?;

        debug!(reply = %content, "Classifier API reply");

        Ok(content)
    }
}

#[async_trait::async_trait]
impl ProductClassifier for OpenAiClient {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn classify(&self, items: &[String]) -> Result<Vec<AiClassification>, AiError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_classification_prompt(items);
        let content = self
            .chat(CLASSIFY_SYSTEM_MESSAGE, &prompt, CLASSIFY_MAX_TOKENS)
            .await?;
        let classifications = parse_classifications(&content, items.len())?;

        info!(count = classifications.len(), "AI classified products");
        Ok(classifications)
    }

    async fn correct_names(&self, items: &[String]) -> Result<Vec<String>, AiError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_correction_prompt(items);
        let content = self
            .chat(CORRECT_SYSTEM_MESSAGE, &prompt, CORRECT_MAX_TOKENS)
            .await?;

        parse_corrected_names(&content, items)
    }
}
