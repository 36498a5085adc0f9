use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive macro implementing `typewire::Wire` for a struct with named fields.
///
/// Fields are laid out on the wire in declaration order. Every field type
/// must itself implement `Wire`.
///
/// Field attributes:
///
/// - `#[wire(rename = "name")]`: field name in the descriptor and in decoded
///   `Value::Record`s. Does not affect the bytes.
/// - `#[wire(skip)]`: not on the wire; set to `Default::default()` on decode.
///
/// # Example
///
/// ```ignore
/// #[derive(typewire::Record)]
/// pub struct Quote {
///     pub symbol: String,
///     #[wire(rename = "px")]
///     pub price: f64,
///     pub levels: Vec<Level>,
///     #[wire(skip)]
///     pub cached_mid: f64,
/// }
/// ```
///
/// Enums, unions, tuple/unit structs and generic structs have no fixed
/// named-field layout and are rejected.
#[proc_macro_derive(Record, attributes(wire))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct WireField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    wire_name: String,
    skip: bool,
}

fn derive_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "unsupported type: Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "unsupported type: Record only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "unsupported type: Record only supports structs",
            ));
        }
    };

    let mut wire_fields = Vec::with_capacity(fields.len());
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;

        // Parse #[wire(...)] attribute.
        let mut rename: Option<String> = None;
        let mut skip = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("wire") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    rename = Some(value.value());
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unknown wire attribute (expected 'rename' or 'skip')"))
                }
            })?;
        }

        let wire_name =
            rename.unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        if !skip && wire_fields.iter().any(|f: &WireField| !f.skip && f.wire_name == wire_name) {
            return Err(syn::Error::new_spanned(
                ident,
                format!("duplicate wire field name '{wire_name}'"),
            ));
        }
        wire_fields.push(WireField {
            ident,
            ty: &field.ty,
            wire_name,
            skip,
        });
    }

    let on_wire: Vec<&WireField> = wire_fields.iter().filter(|f| !f.skip).collect();

    let descriptor_tokens = on_wire.iter().map(|f| {
        let ty = f.ty;
        let wire_name = &f.wire_name;
        quote! {
            ::typewire::FieldDescriptor::new(
                #wire_name,
                <#ty as ::typewire::Wire>::descriptor(),
            )
        }
    });

    let to_value_tokens = on_wire.iter().map(|f| {
        let ident = f.ident;
        let wire_name = &f.wire_name;
        quote! {
            (#wire_name.to_string(), ::typewire::Wire::to_value(&self.#ident))
        }
    });

    // Struct expression fields evaluate in source order, which is wire order.
    let from_value_tokens = wire_fields.iter().map(|f| {
        let ident = f.ident;
        let ty = f.ty;
        let wire_name = &f.wire_name;
        if f.skip {
            quote! { #ident: ::core::default::Default::default() }
        } else {
            quote! { #ident: __fields.next::<#ty>(#wire_name)? }
        }
    });

    let expanded = quote! {
        impl ::typewire::Wire for #name {
            fn descriptor() -> ::typewire::Descriptor {
                static __DESCRIPTOR: ::std::sync::OnceLock<::typewire::Descriptor> =
                    ::std::sync::OnceLock::new();
                __DESCRIPTOR
                    .get_or_init(|| {
                        ::typewire::Descriptor::record(
                            #name_str,
                            ::std::vec![#(#descriptor_tokens),*],
                        )
                    })
                    .clone()
            }

            fn to_value(&self) -> ::typewire::Value {
                ::typewire::Value::Record(::std::vec![#(#to_value_tokens),*])
            }

            fn from_value(
                __value: ::typewire::Value,
            ) -> ::core::result::Result<Self, ::typewire::CodecError> {
                #[allow(unused_mut, unused_variables)]
                let mut __fields = ::typewire::wire::RecordFields::new(#name_str, __value)?;
                ::core::result::Result::Ok(Self {
                    #(#from_value_tokens),*
                })
            }
        }
    };

    Ok(expanded)
}
