use phf::{Map, phf_map};

/// Standard atomic weights (u) for H through Rn.
static ATOMIC_MASSES: Map<u8, f64> = phf_map! {
    1u8 => 1.008, 2u8 => 4.0026, 3u8 => 6.94, 4u8 => 9.0122, 5u8 => 10.81, 6u8 => 12.011,
    7u8 => 14.007, 8u8 => 15.999, 9u8 => 18.998, 10u8 => 20.18, 11u8 => 22.99, 12u8 => 24.305,
    13u8 => 26.982, 14u8 => 28.085, 15u8 => 30.974, 16u8 => 32.06, 17u8 => 35.45, 18u8 => 39.948,
    19u8 => 39.098, 20u8 => 40.078, 21u8 => 44.956, 22u8 => 47.867, 23u8 => 50.942, 24u8 => 51.996,
    25u8 => 54.938, 26u8 => 55.845, 27u8 => 58.933, 28u8 => 58.693, 29u8 => 63.546, 30u8 => 65.38,
    31u8 => 69.723, 32u8 => 72.63, 33u8 => 74.922, 34u8 => 78.971, 35u8 => 79.904, 36u8 => 83.798,
    37u8 => 85.468, 38u8 => 87.62, 39u8 => 88.906, 40u8 => 91.224, 41u8 => 92.906, 42u8 => 95.95,
    43u8 => 97.0, 44u8 => 101.07, 45u8 => 102.91, 46u8 => 106.42, 47u8 => 107.87, 48u8 => 112.41,
    49u8 => 114.82, 50u8 => 118.71, 51u8 => 121.76, 52u8 => 127.6, 53u8 => 126.9, 54u8 => 131.29,
    55u8 => 132.91, 56u8 => 137.33, 57u8 => 138.91, 58u8 => 140.12, 59u8 => 140.91, 60u8 => 144.24,
    61u8 => 145.0, 62u8 => 150.36, 63u8 => 151.96, 64u8 => 157.25, 65u8 => 158.93, 66u8 => 162.5,
    67u8 => 164.93, 68u8 => 167.26, 69u8 => 168.93, 70u8 => 173.05, 71u8 => 174.97, 72u8 => 178.49,
    73u8 => 180.95, 74u8 => 183.84, 75u8 => 186.21, 76u8 => 190.23, 77u8 => 192.22, 78u8 => 195.08,
    79u8 => 196.97, 80u8 => 200.59, 81u8 => 204.38, 82u8 => 207.2, 83u8 => 208.98, 84u8 => 209.0,
    85u8 => 210.0, 86u8 => 222.0,
};

/// Covalent radii (Angstrom) for H through Rn, after Cordero et al. (2008).
static COVALENT_RADII: Map<u8, f64> = phf_map! {
    1u8 => 0.31, 2u8 => 0.28, 3u8 => 1.28, 4u8 => 0.96, 5u8 => 0.84, 6u8 => 0.76,
    7u8 => 0.71, 8u8 => 0.66, 9u8 => 0.57, 10u8 => 0.58, 11u8 => 1.66, 12u8 => 1.41,
    13u8 => 1.21, 14u8 => 1.11, 15u8 => 1.07, 16u8 => 1.05, 17u8 => 1.02, 18u8 => 1.06,
    19u8 => 2.03, 20u8 => 1.76, 21u8 => 1.7, 22u8 => 1.6, 23u8 => 1.53, 24u8 => 1.39,
    25u8 => 1.39, 26u8 => 1.32, 27u8 => 1.26, 28u8 => 1.24, 29u8 => 1.32, 30u8 => 1.22,
    31u8 => 1.22, 32u8 => 1.2, 33u8 => 1.19, 34u8 => 1.2, 35u8 => 1.2, 36u8 => 1.16,
    37u8 => 2.2, 38u8 => 1.95, 39u8 => 1.9, 40u8 => 1.75, 41u8 => 1.64, 42u8 => 1.54,
    43u8 => 1.47, 44u8 => 1.46, 45u8 => 1.42, 46u8 => 1.39, 47u8 => 1.45, 48u8 => 1.44,
    49u8 => 1.42, 50u8 => 1.39, 51u8 => 1.39, 52u8 => 1.38, 53u8 => 1.39, 54u8 => 1.4,
    55u8 => 2.44, 56u8 => 2.15, 57u8 => 2.07, 58u8 => 2.04, 59u8 => 2.03, 60u8 => 2.01,
    61u8 => 1.99, 62u8 => 1.98, 63u8 => 1.98, 64u8 => 1.96, 65u8 => 1.94, 66u8 => 1.92,
    67u8 => 1.92, 68u8 => 1.89, 69u8 => 1.9, 70u8 => 1.87, 71u8 => 1.87, 72u8 => 1.75,
    73u8 => 1.7, 74u8 => 1.62, 75u8 => 1.51, 76u8 => 1.44, 77u8 => 1.41, 78u8 => 1.36,
    79u8 => 1.36, 80u8 => 1.32, 81u8 => 1.45, 82u8 => 1.46, 83u8 => 1.48, 84u8 => 1.4,
    85u8 => 1.5, 86u8 => 1.5,
};

pub fn atomic_mass(number: u8) -> Option<f64> {
    ATOMIC_MASSES.get(&number).copied()
}

pub fn covalent_radius(number: u8) -> Option<f64> {
    COVALENT_RADII.get(&number).copied()
}

/// Whether both tables carry data for `number`.
pub fn is_known(number: u8) -> bool {
    ATOMIC_MASSES.contains_key(&number) && COVALENT_RADII.contains_key(&number)
}
