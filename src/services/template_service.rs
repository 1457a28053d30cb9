//! services/template_service.rs
//! Sustitución de `{{campo}}` en el HTML. No es un lenguaje de plantillas: nunca falla.

use crate::models::recipient_model::Recipient;

/// Reemplaza cada `{{campo}}` por el valor del destinatario (vacío si no existe).
/// Los placeholders mal formados (sin cerrar, nombre vacío o multilínea) se dejan tal cual.
pub fn render(body: &str, recipient: &Recipient) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        let Some(close) = after_open.find("}}") else {
            // Sin cierre: el resto va literal.
            out.push_str(&rest[open..]);
            return out;
        };

        let key = after_open[..close].trim();
        if is_placeholder_name(key) {
            out.push_str(recipient.get(key).unwrap_or(""));
            rest = &after_open[close + 2..];
        } else {
            // No es un placeholder: emitimos una sola llave, el siguiente "{{" puede abrir uno.
            out.push('{');
            rest = &rest[open + 1..];
        }
    }

    out.push_str(rest);
    out
}

fn is_placeholder_name(key: &str) -> bool {
    !key.is_empty() && !key.contains(|c: char| c == '{' || c == '}' || c == '\n' || c == '\r')
}
