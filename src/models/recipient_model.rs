//! models/recipient_model.rs

use std::collections::HashMap;

/// Una fila de la lista de destinatarios: nombre de columna -> valor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipient {
    pub fields: HashMap<String, String>,
}

impl Recipient {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Recipient { fields }
    }

    /// Busca un campo: primero exacto, luego sin distinguir mayúsculas.
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.fields.get(key) {
            return Some(v.as_str());
        }
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// El campo `email` (Email, EMAIL...), si existe y no está vacío.
    pub fn email(&self) -> Option<&str> {
        self.get("email").map(str::trim).filter(|v| !v.is_empty())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Recipient {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Recipient::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
