//! Static attribute dictionary
//!
//! Last-resort code -> description tables for the six attribute classes,
//! used when neither the live service nor any cache has data.

use epw_types::{AttributeClass, AttributeEntry};

const TIPO: &[(&str, &str)] = &[
    ("R", "Régua"),
    ("P", "Perfil"),
    ("C", "Calha"),
    ("T", "Tubo"),
    ("B", "Barra"),
    ("K", "Kit"),
    ("CH", "Chapa"),
    ("PF", "Perfil Fino"),
    ("TQ", "Tubo Quadrado"),
];

const CERTIF: &[(&str, &str)] = &[
    ("S", "Sem"),
    ("C", "Certificado CE"),
    ("A", "ATEX"),
    ("U", "UL"),
];

const MODELO: &[(&str, &str)] = &[
    ("--", "Genérico"),
    ("C", "Clássico"),
    ("M", "Moderno"),
    ("L", "Linear"),
    ("P", "Plano"),
    ("R", "Redondo"),
    ("SL", "Slim"),
    ("XL", "Extra Largo"),
];

const COMPRIM: &[(&str, &str)] = &[
    ("10", "1000 mm"),
    ("15", "1500 mm"),
    ("20", "2000 mm"),
    ("23", "2300 mm"),
    ("25", "2500 mm"),
    ("30", "3000 mm"),
    ("60", "6000 mm"),
];

const COR: &[(&str, &str)] = &[
    ("B", "Branco"),
    ("P", "Preto"),
    ("C", "Cinza"),
    ("N", "Natural"),
    ("D", "Dourado"),
];

const ACABAMENTO: &[(&str, &str)] = &[
    ("L", "Lacado"),
    ("A", "Anodizado"),
    ("N", "Natural"),
    ("E", "Escovado"),
    ("P", "Polido"),
];

fn table(class: AttributeClass) -> &'static [(&'static str, &'static str)] {
    match class {
        AttributeClass::Tipo => TIPO,
        AttributeClass::Certif => CERTIF,
        AttributeClass::Modelo => MODELO,
        AttributeClass::Comprim => COMPRIM,
        AttributeClass::Cor => COR,
        AttributeClass::Acabamento => ACABAMENTO,
    }
}

/// Description for `(class, code)`, if the static table knows it
pub fn lookup(class: AttributeClass, code: &str) -> Option<&'static str> {
    table(class)
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, d)| *d)
}

/// All static entries for one class
pub fn entries(class: AttributeClass) -> Vec<AttributeEntry> {
    table(class)
        .iter()
        .map(|(c, d)| AttributeEntry::new(*c, *d))
        .collect()
}
