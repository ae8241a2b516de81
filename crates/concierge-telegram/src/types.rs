use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 7, "message": {
                    "message_id": 11,
                    "from": {"id": 5, "is_bot": false, "first_name": "Анна"},
                    "chat": {"id": 5, "type": "private"},
                    "date": 1700000000,
                    "text": "Привет"
                }},
                {"update_id": 8}
            ]
        }"#;
        let parsed: TelegramResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.from.as_ref().unwrap().first_name, "Анна");
        assert_eq!(msg.text.as_deref(), Some("Привет"));
        assert!(updates[1].message.is_none());
    }
}
