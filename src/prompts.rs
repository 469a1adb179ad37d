//! Fixed prompt templates for the classifier and the crawler.

/// Classification question for one company profile.
pub fn classify_prompt(name: &str, description: &str, industries: &[String]) -> String {
    format!(
        r#"Given the following business information, determine the most appropriate NACE Rev. 2 classification codes and titles.
Return as many appropriate classifications as possible using the provided context.

Business Name: {name}
Business Description: {description}
Business Industries: {industries}

Based on the NACE Rev. 2 classification context provided, please:

1. Identify the most appropriate NACE Rev. 2 classification codes and titles.
2. Return as many appropriate classifications as possible.
3. Return at least 5 classification codes structured as an array of strings with the value:
    - "code": The NACE Rev. 2 classification code.

Format your response as a JSON array of strings with the following structure:

["XX.XX","XX.XX","XX.XX",...]
"#,
        name = name,
        description = description,
        industries = industries.join(", "),
    )
}

/// Wrap retrieved scope documents and the question for the model.
pub fn with_context(context: &str, question: &str) -> String {
    format!("Context:\n{}\n\nQuestion:\n{}", context, question)
}

/// Company-profile extraction request for one website.
///
/// `industries` is the list of industry ids the model must map onto.
pub fn crawler_prompt(company_url: &str, industries: &[String]) -> String {
    format!(
        r#"Please extract the following information from the provided company website and return it in a structured JSON format. Include:

1. Company Name: The full legal name of the company.
2. Company Description: A brief overview of the company's activities, industry, and expertise.
3. Company Industries: An array of main sectors or industries the company operates in.
4. Company Objectives: The company's mission, vision, and core values.
5. Principal Person: The name and designation of the company's primary leader or spokesperson as `principal_person` and `principal_designation`.
6. Company Address: The primary office location as a structured address object with `address_line_1`, `address_line_2`, `city`, `state`, `country`, and `postal_code`. `country` should be a 2-letter code. If the `state` is not provided, use a `region` value in the `state` field.
7. Contact Email: The primary contact email for the company.
8. Website: The company's official website URL.
9. Country: The country (2-letter code) the company is registered in.
10. Number of Employees: a range of number of employees in the company.

Format the output as follows:

{{
  "name": "string",
  "description": "string",
  "website": "string",
  "industries": ["string", "string"],
  "objectives": "string",
  "principal_person": "string",
  "principal_designation": "string",
  "address": {{
      "address_line_1": "string",
      "address_line_2": "string",
      "city": "string",
      "state": "string",
      "country": "string",
      "postal_code": "string"
  }},
  "country": "string",
  "contact_email": "string",
  "number_of_employees": "string"
}}

Map the industry to one of the following:
{industries}

The company URL is: {company_url}. Extract only publicly available information, ensuring accuracy and completeness.
For any fields that are not available, return null as the value. DO NOT fill in the fields with placeholders.
"#,
        industries = industries.join("\n"),
        company_url = company_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prompt_fields() {
        let p = classify_prompt("Acme", "Bakes bread", &["food".into(), "retail".into()]);
        assert!(p.contains("Business Name: Acme"));
        assert!(p.contains("Business Description: Bakes bread"));
        assert!(p.contains("Business Industries: food, retail"));
        assert!(p.contains(r#"["XX.XX","XX.XX","XX.XX",...]"#));
    }

    #[test]
    fn test_crawler_prompt_renders_braces_and_list() {
        let p = crawler_prompt("https://acme.test", &["agriculture".into(), "mining".into()]);
        assert!(p.contains("  \"name\": \"string\","));
        assert!(p.contains("\"address\": {\n"));
        assert!(p.contains("agriculture\nmining"));
        assert!(p.contains("The company URL is: https://acme.test."));
    }

    #[test]
    fn test_with_context_layout() {
        assert_eq!(with_context("ctx", "q?"), "Context:\nctx\n\nQuestion:\nq?");
    }
}
