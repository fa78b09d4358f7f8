//! Prompt and request-body construction for food analysis calls.

/// Instruction prompt describing the exact JSON shape the model must return.
pub fn analysis_prompt() -> &'static str {
    r#"Analyze this food image and return a JSON object with the following structure:
{
    "ingredients": [
        {
            "name": "string",
            "quantity": number,
            "unit": "string (g, ml, oz, etc.)",
            "calories": number
        }
    ],
    "totalCalories": number,
    "mealType": "string (breakfast/lunch/dinner/snack)",
    "description": "string (brief description of the meal)"
}

Be accurate with calorie estimates based on the visible ingredients and quantities."#
}

/// Build the chat-completions request body for one analysis.
///
/// Pure construction: inputs are interpolated uninspected, validation is
/// the caller's responsibility. The image travels as a JPEG data URI and
/// the response is constrained to a JSON object.
pub fn build_analysis_request(
    model: &str,
    image_base64: &str,
    max_tokens: u32,
) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": analysis_prompt()
                    },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:image/jpeg;base64,{}", image_base64)
                        }
                    }
                ]
            }
        ],
        "response_format": {
            "type": "json_object"
        },
        "max_tokens": max_tokens
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_every_expected_field() {
        let prompt = analysis_prompt();
        assert!(prompt.contains("ingredients"));
        assert!(prompt.contains("quantity"));
        assert!(prompt.contains("unit"));
        assert!(prompt.contains("calories"));
        assert!(prompt.contains("totalCalories"));
        assert!(prompt.contains("mealType"));
        assert!(prompt.contains("description"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = build_analysis_request("gpt-4o", "aW1hZ2U=", 1000);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["response_format"]["type"], "json_object");

        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], analysis_prompt());
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/jpeg;base64,aW1hZ2U="
        );
    }

    #[test]
    fn test_request_body_passes_empty_image_through() {
        let body = build_analysis_request("gpt-4o", "", 1000);
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,"
        );
    }
}
