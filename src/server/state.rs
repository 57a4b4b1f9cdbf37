use crate::location::LocationResolver;

pub struct AppState {
    pub resolver: LocationResolver,
}
