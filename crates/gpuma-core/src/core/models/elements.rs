use phf::{Map, phf_map};

/// Single-bond covalent radii in Angstrom (Cordero et al., 2008) for the
/// elements that occur in typical organic and organometallic inputs.
#[rustfmt::skip]
static COVALENT_RADII: Map<&'static str, f64> = phf_map! {
    "H"  => 0.31, "He" => 0.28,
    "Li" => 1.28, "Be" => 0.96, "B"  => 0.84, "C"  => 0.76, "N"  => 0.71,
    "O"  => 0.66, "F"  => 0.57, "Ne" => 0.58,
    "Na" => 1.66, "Mg" => 1.41, "Al" => 1.21, "Si" => 1.11, "P"  => 1.07,
    "S"  => 1.05, "Cl" => 1.02, "Ar" => 1.06,
    "K"  => 2.03, "Ca" => 1.76, "Sc" => 1.70, "Ti" => 1.60, "V"  => 1.53,
    "Cr" => 1.39, "Mn" => 1.39, "Fe" => 1.32, "Co" => 1.26, "Ni" => 1.24,
    "Cu" => 1.32, "Zn" => 1.22, "Ga" => 1.22, "Ge" => 1.20, "As" => 1.19,
    "Se" => 1.20, "Br" => 1.20, "Kr" => 1.16,
    "Rb" => 2.20, "Sr" => 1.95, "Pd" => 1.39, "Ag" => 1.45, "Cd" => 1.44,
    "Sn" => 1.39, "Sb" => 1.39, "Te" => 1.38, "I"  => 1.39, "Xe" => 1.40,
    "Pt" => 1.36, "Au" => 1.36, "Hg" => 1.32, "Pb" => 1.46,
};

/// Normalizes the capitalization of an element symbol (`"CL"` -> `"Cl"`).
pub fn normalize_symbol(symbol: &str) -> String {
    let mut chars = symbol.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

pub fn covalent_radius(symbol: &str) -> Option<f64> {
    COVALENT_RADII
        .get(symbol)
        .or_else(|| COVALENT_RADII.get(normalize_symbol(symbol).as_str()))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_normalized_before_lookup() {
        assert_eq!(normalize_symbol("CL"), "Cl");
        assert_eq!(normalize_symbol(" h "), "H");
        assert_eq!(covalent_radius("cl"), Some(1.02));
        assert_eq!(covalent_radius("FE"), Some(1.32));
    }

    #[test]
    fn unknown_symbols_return_none() {
        assert_eq!(covalent_radius("Xx"), None);
        assert_eq!(covalent_radius(""), None);
    }
}
