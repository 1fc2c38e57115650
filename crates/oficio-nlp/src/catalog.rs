//! Curated constants: the service catalog with synonyms, Ecuadorian city
//! synonyms, and the small intent word sets.
//!
//! Synonyms are written pre-normalized (lowercase, no accents); canonical
//! city names keep their proper spelling because they are shown to users
//! and persisted on the customer profile.

/// Canonical service names, used as the exact-match fallback after synonyms.
pub const COMMON_SERVICES: &[&str] = &[
    "plomero",
    "electricista",
    "carpintero",
    "pintor",
    "albañil",
    "cerrajero",
    "mecánico",
    "jardinero",
    "limpieza",
    "mudanzas",
    "abogado",
    "contador",
    "arquitecto",
    "diseñador gráfico",
    "marketing",
    "community manager",
    "fotógrafo",
    "peluquero",
    "niñera",
    "profesor",
    "técnico de computadoras",
    "técnico de refrigeración",
];

/// Canonical service → normalized synonyms.
pub const COMMON_SERVICE_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "plomero",
        &[
            "plomeria",
            "fontanero",
            "fontaneria",
            "gasfitero",
            "gasfiteria",
            "tuberias",
            "destapar canerias",
            "fuga de agua",
        ],
    ),
    (
        "electricista",
        &["electricidad", "instalacion electrica", "cortocircuito", "cableado"],
    ),
    ("carpintero", &["carpinteria", "muebles a medida", "ebanista"]),
    ("pintor", &["pintura", "pintar casa", "pintar departamento"]),
    ("albañil", &["albanil", "albanileria", "construccion", "maestro de obra"]),
    ("cerrajero", &["cerrajeria", "abrir puerta", "cambiar cerradura", "llaves"]),
    (
        "mecánico",
        &["mecanico", "mecanica", "taller automotriz", "arreglar carro", "arreglar auto"],
    ),
    ("jardinero", &["jardineria", "cortar cesped", "poda"]),
    (
        "limpieza",
        &["limpieza de hogar", "limpieza profunda", "empleada domestica", "servicio de limpieza"],
    ),
    ("mudanzas", &["mudanza", "flete", "transporte de muebles"]),
    ("abogado", &["abogada", "asesoria legal", "tramites legales", "juicio"]),
    ("contador", &["contadora", "contabilidad", "declaracion de impuestos", "sri"]),
    ("arquitecto", &["arquitecta", "planos", "diseno de casa"]),
    (
        "diseñador gráfico",
        &["disenador grafico", "diseno grafico", "logo", "diseno de logo", "branding"],
    ),
    (
        "marketing",
        &["publicidad", "mercadotecnia", "mercadeo", "marketing digital", "promocion"],
    ),
    (
        "community manager",
        &[
            "gestor de redes sociales",
            "redes sociales",
            "social media",
            "social media manager",
            "manejo de redes",
        ],
    ),
    ("fotógrafo", &["fotografo", "fotografia", "sesion de fotos"]),
    ("peluquero", &["peluquera", "peluqueria", "corte de cabello", "estilista"]),
    ("niñera", &["ninera", "cuidado de ninos", "babysitter"]),
    (
        "profesor",
        &["profesora", "clases particulares", "tutor", "tutorias", "nivelacion"],
    ),
    (
        "técnico de computadoras",
        &[
            "tecnico de computadoras",
            "arreglar computadora",
            "reparacion de computadoras",
            "soporte tecnico",
            "formatear laptop",
        ],
    ),
    (
        "técnico de refrigeración",
        &[
            "tecnico de refrigeracion",
            "arreglar refrigeradora",
            "aire acondicionado",
            "linea blanca",
        ],
    ),
];

/// Canonical Ecuadorian city → normalized synonyms (typos included).
pub const ECUADOR_CITY_SYNONYMS: &[(&str, &[&str])] = &[
    ("Quito", &["quito"]),
    ("Guayaquil", &["guayaquil"]),
    ("Cuenca", &["cuenca", "cueca"]),
    ("Santo Domingo", &["santo domingo", "santo domingo de los tsachilas"]),
    ("Manta", &["manta"]),
    ("Portoviejo", &["portoviejo"]),
    ("Machala", &["machala"]),
    ("Durán", &["duran"]),
    ("Loja", &["loja"]),
    ("Ambato", &["ambato"]),
    ("Riobamba", &["riobamba"]),
    ("Esmeraldas", &["esmeraldas"]),
    ("Quevedo", &["quevedo"]),
    ("Babahoyo", &["babahoyo", "baba hoyo"]),
    ("Milagro", &["milagro"]),
    ("Ibarra", &["ibarra"]),
    ("Tulcán", &["tulcan"]),
    ("Latacunga", &["latacunga"]),
    ("Salinas", &["salinas"]),
];

/// Greeting-only messages get the initial prompt, not a search.
pub const GREETINGS: &[&str] = &[
    "hola",
    "buenas",
    "buenos dias",
    "buenas tardes",
    "buenas noches",
    "hey",
    "hello",
    "hi",
    "saludos",
    "que tal",
];

/// Typed commands that wipe the flow, city, and consent.
pub const RESET_KEYWORDS: &[&str] = &["reiniciar", "reset", "restart", "inicio", "empezar de nuevo"];

pub const AFFIRMATIVE_WORDS: &[&str] = &[
    "si",
    "sí",
    "claro",
    "ok",
    "dale",
    "listo",
    "bueno",
    "correcto",
    "afirmativo",
    "por supuesto",
    "de acuerdo",
    "acepto",
    "yes",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "no",
    "nope",
    "negativo",
    "no gracias",
    "nunca",
    "jamas",
    "no acepto",
    "cancelar",
    "ya no",
];
