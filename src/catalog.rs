//! Display labels for the enum codes the backend sends.

use serde::{Deserialize, Serialize};

macro_rules! labelled {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($code:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $code)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> &'static str {
                match self { $($name::$variant => $code),+ }
            }

            pub fn label(self) -> &'static str {
                match self { $($name::$variant => $label),+ }
            }

            pub fn from_code(code: &str) -> Option<Self> {
                match code { $($code => Some($name::$variant),)+ _ => None }
            }
        }
    };
}

labelled!(
    Specialist {
        Eye => ("eye", "Eye Specialist"),
        Cardiologist => ("cardiologist", "Cardiologist"),
        Gynecologist => ("gynecologist", "Gynecologist"),
        Neurologist => ("neurologist", "Neurologist"),
        Orthopedic => ("orthopedic", "Orthopedic"),
        Dermatologist => ("dermatologist", "Dermatologist"),
        Pediatrician => ("pediatrician", "Pediatrician"),
        Psychiatrist => ("psychiatrist", "Psychiatrist"),
        General => ("general", "General Physician"),
    }
);

labelled!(
    Location {
        Dhaka => ("dhaka", "Dhaka"),
        Chittagong => ("chittagong", "Chittagong"),
        Rajshahi => ("rajshahi", "Rajshahi"),
        Khulna => ("khulna", "Khulna"),
        Barisal => ("barisal", "Barisal"),
        Sylhet => ("sylhet", "Sylhet"),
        Rangpur => ("rangpur", "Rangpur"),
        Mymensingh => ("mymensingh", "Mymensingh"),
    }
);

labelled!(
    /// Lifecycle of a doctor or nurse appointment.
    AppointmentStatus {
        Pending => ("pending", "Pending"),
        Approved => ("approved", "Approved"),
        Cancelled => ("cancelled", "Cancelled"),
        Completed => ("completed", "Completed"),
    }
);

/// Label for a code, falling back to the code itself for values this build
/// does not know.
pub fn label_or_code<'a>(code: &'a str, lookup: impl Fn(&str) -> Option<&'static str>) -> &'a str {
    match lookup(code) {
        Some(label) => label,
        None => code,
    }
}

pub fn specialist_label(code: &str) -> &str {
    label_or_code(code, |c| Specialist::from_code(c).map(Specialist::label))
}

pub fn location_label(code: &str) -> &str {
    label_or_code(code, |c| Location::from_code(c).map(Location::label))
}
