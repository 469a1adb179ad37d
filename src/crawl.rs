//! Company-profile extraction from a website address.

use anyhow::{bail, Context, Result};

use crate::company::CompanyProfile;
use crate::config::Config;
use crate::db;
use crate::industries;
use crate::llm::{self, LanguageModel};
use crate::prompts;

/// Trim the address and prefix `https://` when it has no http(s) scheme.
pub fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        bail!("website must not be empty");
    }
    if url.contains(char::is_whitespace) {
        bail!("invalid website: {}", url);
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Ok(format!("https://{}", url))
    }
}

/// Ask the model for the profile of the company at `url`.
///
/// `industries` are the industry ids the model should map onto. The
/// normalized URL fills `website` when the model leaves it empty.
pub async fn crawl<M: LanguageModel + ?Sized>(
    model: &M,
    url: &str,
    industries: &[String],
) -> Result<CompanyProfile> {
    let url = normalize_url(url)?;
    let answer = model
        .complete(&prompts::crawler_prompt(&url, industries))
        .await?;

    let json = llm::extract_json(&answer)?;
    let mut profile: CompanyProfile =
        serde_json::from_value(json).context("model answer is not a company profile")?;
    if profile.website.as_deref().map_or(true, |w| w.trim().is_empty()) {
        profile.website = Some(url);
    }
    Ok(profile)
}

/// `nace crawl <url>`
pub async fn run_crawl(config: &Config, url: &str) -> Result<()> {
    let model = llm::create_model(&config.llm)?;
    let pool = db::connect(config).await?;
    let ids: Vec<String> = industries::list_industries(&pool)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();
    pool.close().await;

    let profile = crawl(model.as_ref(), url, &ids).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::tests::CannedModel;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("acme.test").unwrap(), "https://acme.test");
        assert_eq!(normalize_url(" http://acme.test/ ").unwrap(), "http://acme.test/");
        assert_eq!(normalize_url("HTTPS://Acme.test").unwrap(), "HTTPS://Acme.test");
        assert!(normalize_url("  ").is_err());
        assert!(normalize_url("acme test").is_err());
    }

    #[tokio::test]
    async fn test_crawl_parses_profile() {
        let model = CannedModel::new(
            r#"```json
{
  "name": "Acme Ltd",
  "description": "Bakery",
  "website": null,
  "industries": ["food_beverage"],
  "address": { "address_line_1": "1 Main St", "city": "Lagos", "country": "NG" },
  "contact_email": "hello@acme.test",
  "number_of_employees": "10-50"
}
```"#,
        );

        let profile = crawl(&model, "acme.test", &["food_beverage".into(), "mining".into()])
            .await
            .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Acme Ltd"));
        assert_eq!(profile.website.as_deref(), Some("https://acme.test"));
        assert_eq!(profile.address.unwrap().country.as_deref(), Some("NG"));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("food_beverage\nmining"));
        assert!(prompts[0].contains("The company URL is: https://acme.test."));
    }

    #[tokio::test]
    async fn test_crawl_rejects_array_answer() {
        let model = CannedModel::new("[\"01.11\"]");
        assert!(crawl(&model, "acme.test", &[]).await.is_err());
    }
}
