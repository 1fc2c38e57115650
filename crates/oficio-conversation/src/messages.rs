//! Every user-visible text, in one place. Spanish is the product language;
//! WhatsApp `*bold*` markup is used throughout.

use oficio_core::types::ProviderRecord;

pub const INITIAL_SERVICE_PROMPT: &str =
    "*¡Hola! 👋 ¿Qué servicio necesitas hoy?*\n\nPor ejemplo: plomero, electricista, abogado, diseñador gráfico.";

pub const CITY_PROMPT: &str = "*¿En qué ciudad lo necesitas?*";

pub const CITY_NOT_RECOGNIZED: &str =
    "No reconocí la ciudad. Escríbela de nuevo usando una ciudad de Ecuador (ej: Quito, Guayaquil, Cuenca).";

pub const SEARCHING_NOTICE: &str = "⏳ *Estoy buscando proveedores. Te aviso en breve.*";

pub const CONFIRMING_AVAILABILITY: &str =
    "⏳ *Estoy confirmando disponibilidad. Te aviso en breve.*";

pub const SELECT_PROVIDER_INSTRUCTION: &str =
    "Responde con el número del proveedor para ver más detalles.";

pub const SELECT_PROVIDER_RETRY: &str =
    "Por favor selecciona un número de la lista o escribe *nuevo* para buscar otro servicio.";

pub const PROVIDER_DETAIL_MENU: &str = "*1.* Contactar\n*2.* Ver otro proveedor\n*3.* Salir";

pub const NUMERIC_FOOTER: &str = "Responde con el número de la opción.";

pub const SERVICE_FORMAT_ERROR: &str =
    "Para ayudarte necesito que me digas el servicio en pocas palabras. Por ejemplo: *plomero*, *electricista*, *abogado*.";

pub const NONSENSE_ERROR: &str =
    "🤔 No logré entender tu mensaje. Cuéntame en pocas palabras qué servicio necesitas, por ejemplo: *plomero* o *electricista*.";

pub const ACCOUNT_SUSPENDED: &str = "🚫 Tu cuenta está temporalmente suspendida.";

pub const BAN_NOTICE: &str =
    "🚫 *Tu cuenta ha sido suspendida por 24 horas* por solicitudes que no podemos atender. Podrás escribirnos nuevamente pasado ese tiempo.";

pub const INACTIVITY_NOTICE: &str =
    "*No tuve respuesta y reinicié la conversación para ayudarte mejor.*";

pub const NEW_SESSION: &str = "Nueva sesión iniciada.";

pub const FAREWELL: &str =
    "*¡Gracias por utilizar nuestros servicios!* Si necesitas algo más, solo escríbeme.";

pub const QUICK_CLOSE: &str =
    "Perfecto ✅. Cuando necesites algo más, solo escríbeme y estaré aquí para ayudarte.";

pub const NEW_SEARCH_TITLE: &str = "¿Te ayudo con otro servicio?";

pub const GUIDANCE_NO_SERVICE: &str =
    "Estoy teniendo problemas para entender exactamente el servicio que necesitas. ¿Podrías decirlo en una palabra? Por ejemplo: marketing, publicidad, diseño, plomería.";

// Consent flow ------------------------------------------------------------

pub const CONSENT_INTRO: &str =
    "*Antes de continuar necesito tu autorización.* 🔐\n\nPara conectarte con profesionales compartiré tu número de teléfono con el proveedor que elijas.";

pub const CONSENT_PROMPT: &str =
    "¿Autorizas compartir tus datos de contacto con los proveedores?\n\n*1.* Acepto\n*2.* No acepto";

pub const CONSENT_ACCEPT_LABEL: &str = "Acepto";
pub const CONSENT_DECLINE_LABEL: &str = "No acepto";

pub const CONSENT_DECLINED: &str =
    "Entiendo. Sin esa autorización no puedo conectarte con proveedores. Si cambias de opinión, solo escríbeme. 👋";

// Confirm-new-search options ----------------------------------------------

pub const CONFIRM_YES_LABEL: &str = "Sí, buscar otro servicio";
pub const CONFIRM_CITY_LABEL: &str = "Cambiar de ciudad";
pub const CONFIRM_PROVIDERS_LABEL: &str = "Ver los proveedores anteriores";
pub const CONFIRM_NO_LABEL: &str = "No, por ahora está bien";

pub fn reroute_city_prompt(service: &str) -> String {
    format!(
        "Entendido, para *{}* ¿en qué ciudad lo necesitas? (ejemplo: Quito, Cuenca)",
        service
    )
}

pub fn warning_notice(count: u32) -> String {
    format!(
        "⚠️ *Advertencia {}/2:* tu mensaje parece solicitar algo que no podemos atender. Si se repite, tu cuenta será suspendida.",
        count
    )
}

pub fn found_count(n: usize, city: &str) -> String {
    if n == 1 {
        format!("✅ *He encontrado 1 profesional en {}.*", city)
    } else {
        format!("✅ *He encontrado {} profesionales en {}.*", n, city)
    }
}

pub fn no_results(service: &str, city: &str) -> String {
    format!(
        "❌ *No encontré profesionales para {} en {}.*\n\nIntenta con otra ciudad o un servicio diferente.",
        service, city
    )
}

pub fn no_availability(service: &str, city: &str) -> String {
    format!(
        "⏰ *Los proveedores no respondieron a tiempo.*\n\nNo encontré profesionales disponibles para {} en {}.",
        service, city
    )
}

pub fn providers_intro(city: &str) -> String {
    format!("*Estos son los profesionales disponibles en {}:*", city)
}

/// Compact numbered listing, one line per provider.
pub fn provider_list_block(providers: &[ProviderRecord]) -> String {
    providers
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut line = format!("*{}.* {}", i + 1, p.display_name());
            if let Some(rating) = p.rating {
                line.push_str(&format!(" ⭐ {:.1}", rating));
            }
            if let Some(profession) = &p.profession {
                line.push_str(&format!(" — {}", profession));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full detail card for one provider.
pub fn provider_detail_block(p: &ProviderRecord) -> String {
    let mut lines = vec![format!("*{}*", p.display_name())];
    if p.verified {
        lines.push("✅ Verificado".to_string());
    }
    if let Some(city) = &p.city {
        lines.push(format!("📍 {}", city));
    }
    if let Some(rating) = p.rating {
        lines.push(format!("⭐ {:.1}/5", rating));
    }
    if let Some(profession) = &p.profession {
        lines.push(format!("🔧 {}", profession));
    }
    if !p.services.is_empty() {
        let shown: Vec<&str> = p.services.iter().take(3).map(String::as_str).collect();
        lines.push(format!("🛠 {}", shown.join(", ")));
    }
    if let Some(years) = p.years_of_experience {
        lines.push(format!("📅 {} años de experiencia", years));
    }
    lines.join("\n")
}

/// Confirmation to the client after sharing contact data.
pub fn connection_message(p: &ProviderRecord) -> String {
    let mut text = format!(
        "¡Listo! He compartido tu contacto con *{}*.",
        p.display_name()
    );
    if let Some(phone) = &p.phone {
        text.push_str(&format!("\n\nSu número es: {}", phone));
    }
    text.push_str("\n\nTe contactará pronto.");
    text
}

/// Out-of-band notice pushed to the provider when a client picks them.
pub fn provider_notification(customer_phone: &str, service: &str, city: &str) -> String {
    format!(
        "¡Nuevo cliente interesado!\n\nEl cliente {} está interesado en tus servicios de {} en {}.\n\nPor favor contáctalo a la brevedad.",
        customer_phone, service, city
    )
}

/// Bold a confirmation title without double-wrapping.
pub fn bold(text: &str) -> String {
    let stripped = text.trim().trim_matches('*');
    if stripped.is_empty() {
        return String::new();
    }
    format!("*{}*", stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderRecord {
        ProviderRecord {
            id: Some("p1".into()),
            name: Some("Ana Pérez".into()),
            phone: Some("+593991112222".into()),
            city: Some("Quito".into()),
            rating: Some(4.75),
            profession: Some("plomero".into()),
            services: vec!["tuberías".into(), "grifería".into()],
            years_of_experience: Some(8),
            verified: true,
            ..Default::default()
        }
    }

    #[test]
    fn list_block_numbers_from_one() {
        let block = provider_list_block(&[provider(), provider()]);
        assert!(block.starts_with("*1.* Ana Pérez ⭐ 4.8"));
        assert!(block.contains("*2.* Ana Pérez"));
    }

    #[test]
    fn detail_block_carries_key_facts() {
        let block = provider_detail_block(&provider());
        assert!(block.contains("*Ana Pérez*"));
        assert!(block.contains("✅ Verificado"));
        assert!(block.contains("📍 Quito"));
        assert!(block.contains("8 años"));
    }

    #[test]
    fn singular_and_plural_counts() {
        assert_eq!(found_count(1, "Loja"), "✅ *He encontrado 1 profesional en Loja.*");
        assert!(found_count(4, "Loja").contains("4 profesionales"));
    }

    #[test]
    fn bold_does_not_double_wrap() {
        assert_eq!(bold("hola"), "*hola*");
        assert_eq!(bold("*hola*"), "*hola*");
        assert_eq!(bold("  "), "");
    }

    #[test]
    fn connection_message_includes_phone() {
        let text = connection_message(&provider());
        assert!(text.contains("Ana Pérez"));
        assert!(text.contains("+593991112222"));
    }
}
